//! Observable task list backed by the [`Database`].
//!
//! The repository owns the connection and the last list result. Store work
//! runs on tokio's blocking pool; the latest result is published through a
//! `watch` channel so any number of observers see the same snapshot.
//!
//! Single-writer contract: every mutation goes through this type, and each
//! one re-runs the last query before returning, so the published list never
//! lags a completed write made through the same repository.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::database::Database;
use crate::model::{Task, TaskId};

#[derive(Clone)]
pub struct TaskRepository {
    inner: Arc<Inner>,
}

struct Inner {
    db: Mutex<Database>,
    tasks: watch::Sender<Vec<Task>>,
    search_filter: Mutex<String>,
}

impl TaskRepository {
    pub fn new(db: Database) -> Self {
        let (tasks, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                tasks,
                search_filter: Mutex::new(String::new()),
            }),
        }
    }

    pub fn open(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(Database::initialize(config)?))
    }

    /// Observe the last published list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.inner.tasks.subscribe()
    }

    pub fn current(&self) -> Vec<Task> {
        self.inner.tasks.borrow().clone()
    }

    pub fn search_filter(&self) -> String {
        self.inner.search_filter.lock().clone()
    }

    /// Query by title substring, publish the result, and remember the filter for later refreshes.
    pub async fn load_tasks(&self, title: &str) -> Result<Vec<Task>> {
        let needle = title.to_string();
        let tasks = self.with_db(move |db| db.fetch_tasks(&needle)).await?;
        *self.inner.search_filter.lock() = title.to_string();
        self.inner.tasks.send_replace(tasks.clone());
        Ok(tasks)
    }

    /// Every stored task, without publishing or touching the search filter.
    pub async fn all_tasks(&self) -> Result<Vec<Task>> {
        self.with_db(|db| db.fetch_tasks("")).await
    }

    pub async fn upcoming_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        self.with_db(move |db| db.fetch_upcoming(now)).await
    }

    pub async fn task_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        self.with_db(move |db| db.fetch_task(id)).await
    }

    /// Persist a new task and return it with its assigned identifier.
    pub async fn insert_task(&self, task: Task) -> Result<Task> {
        let (id, task) = self
            .with_db(move |db| {
                let id = db.insert_task(&task)?;
                Ok((id, task))
            })
            .await?;
        self.refresh().await?;
        Ok(task.with_id(id))
    }

    /// Returns whether a row was updated.
    pub async fn update_task(&self, task: Task) -> Result<bool> {
        let affected = self.with_db(move |db| db.update_task(&task)).await?;
        self.refresh().await?;
        Ok(affected > 0)
    }

    pub async fn set_completed(&self, id: TaskId, completed: bool) -> Result<bool> {
        let affected = self
            .with_db(move |db| db.set_completed(id, completed))
            .await?;
        self.refresh().await?;
        Ok(affected > 0)
    }

    pub async fn delete_task(&self, task: &Task) -> Result<bool> {
        match task.saved_id() {
            Some(id) => self.delete_task_by_id(id).await,
            None => Ok(false),
        }
    }

    /// Delete by identifier; the list is only refreshed when a row was removed.
    pub async fn delete_task_by_id(&self, id: TaskId) -> Result<bool> {
        let affected = self.with_db(move |db| db.delete_task_by_id(id)).await?;
        if affected > 0 {
            self.refresh().await?;
        }
        Ok(affected > 0)
    }

    pub async fn delete_all_tasks(&self) -> Result<usize> {
        let affected = self.with_db(|db| db.delete_all_tasks()).await?;
        self.refresh().await?;
        Ok(affected)
    }

    async fn refresh(&self) -> Result<()> {
        let needle = self.search_filter();
        let tasks = self.with_db(move |db| db.fetch_tasks(&needle)).await?;
        self.inner.tasks.send_replace(tasks);
        Ok(())
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let db = inner.db.lock();
            f(&db)
        })
        .await
        .map_err(|err| anyhow!("blocking task failed: {}", err))?
    }
}
