use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, Row};

use crate::config::AppConfig;
use crate::model::{Task, TaskId};

const TASK_COLUMNS: &str = "id, title, description, due_date, is_completed";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn initialize(config: &AppConfig) -> Result<Self> {
        let conn = Connection::open(config.db_path()).with_context(|| {
            format!("Failed to open database at {}", config.db_path().display())
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to configure SQLite WAL mode")?;

        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Tasks whose title contains `title` (ASCII case-insensitive), earliest due first.
    pub fn fetch_tasks(&self, title: &str) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE title LIKE '%' || :needle || '%' ESCAPE '\\' \
             ORDER BY due_date ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(named_params![":needle": escape_like(title)])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(map_task(row)?);
        }
        Ok(tasks)
    }

    /// Tasks due strictly after `now`, earliest first.
    pub fn fetch_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE due_date > :now ORDER BY due_date ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(named_params![":now": now.timestamp_millis()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(map_task(row)?);
        }
        Ok(tasks)
    }

    pub fn fetch_task(&self, id: TaskId) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? LIMIT 1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(map_task(row)?))
        } else {
            Ok(None)
        }
    }

    /// Insert `task` and return its identifier. A task that already carries an id keeps it.
    pub fn insert_task(&self, task: &Task) -> Result<TaskId> {
        self.conn.execute(
            "INSERT INTO tasks (id, title, description, due_date, is_completed)
             VALUES (:id, :title, :description, :due_date, :completed)",
            named_params![
                ":id": task.saved_id(),
                ":title": &task.title,
                ":description": &task.description,
                ":due_date": task.due_millis(),
                ":completed": task.completed,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(task_id = id, "task inserted");
        Ok(id)
    }

    pub fn update_task(&self, task: &Task) -> Result<usize> {
        let Some(id) = task.saved_id() else {
            return Ok(0);
        };
        let affected = self.conn.execute(
            "UPDATE tasks SET
                title = :title,
                description = :description,
                due_date = :due_date,
                is_completed = :completed
             WHERE id = :id",
            named_params![
                ":title": &task.title,
                ":description": &task.description,
                ":due_date": task.due_millis(),
                ":completed": task.completed,
                ":id": id,
            ],
        )?;
        tracing::debug!(task_id = id, affected, "task updated");
        Ok(affected)
    }

    pub fn set_completed(&self, id: TaskId, completed: bool) -> Result<usize> {
        let affected = self.conn.execute(
            "UPDATE tasks SET is_completed = :completed WHERE id = :id",
            named_params![":completed": completed, ":id": id],
        )?;
        tracing::debug!(task_id = id, completed, affected, "task completion changed");
        Ok(affected)
    }

    pub fn delete_task(&self, task: &Task) -> Result<usize> {
        match task.saved_id() {
            Some(id) => self.delete_task_by_id(id),
            None => Ok(0),
        }
    }

    pub fn delete_task_by_id(&self, id: TaskId) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM tasks WHERE id = :id", named_params![":id": id])?;
        tracing::debug!(task_id = id, affected, "task deleted");
        Ok(affected)
    }

    pub fn delete_all_tasks(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM tasks", [])?;
        tracing::debug!(affected, "all tasks deleted");
        Ok(affected)
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                due_date INTEGER NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0
             );
             CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);
            ",
        )?;
        Ok(())
    }
}

fn map_task(row: &Row<'_>) -> Result<Task> {
    let due_millis: i64 = row.get(3)?;
    Ok(Task {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        due_date: parse_due_millis(due_millis)?,
        completed: row.get(4)?,
    })
}

fn parse_due_millis(raw: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(raw)
        .ok_or_else(|| anyhow!("Stored due date {} is out of range", raw))
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
