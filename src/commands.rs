use std::fmt;
use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;

use crate::app::App;
use crate::cli::{AddArgs, CliCommand, EditArgs, IdsArgs, ListArgs, ShowArgs};
use crate::config::AppConfig;
use crate::core::reminders::SkipReason;
use crate::core::{
    format_due_date, DeleteResult, NotificationTray, ReminderStatus, SaveOutcome, Task, TaskId,
    TaskInput,
};

/// Run a one-shot command, writing its report to `writer`. `watch` is served by [`crate::watch`].
pub async fn execute<W: Write>(config: &AppConfig, command: CliCommand, mut writer: W) -> Result<()> {
    let (app, _alarms) = App::open(config.clone(), Arc::new(NotificationTray::default()))?;
    match command {
        CliCommand::Add(args) => handle_add(&app, args, &mut writer).await,
        CliCommand::Edit(args) => handle_edit(&app, &args, &mut writer).await,
        CliCommand::List(args) => handle_list(&app, &args, &mut writer).await,
        CliCommand::Show(args) => handle_show(&app, &args, &mut writer).await,
        CliCommand::Done(args) => handle_completion(&app, &args, true, &mut writer).await,
        CliCommand::Undone(args) => handle_completion(&app, &args, false, &mut writer).await,
        CliCommand::Delete(args) => handle_delete(&app, &args, &mut writer).await,
        CliCommand::Clear => handle_clear(&app, &mut writer).await,
        CliCommand::Watch(_) => Err(anyhow!("watch runs in the foreground; launch it directly")),
    }
}

async fn handle_add<W: Write>(app: &App, args: AddArgs, mut writer: W) -> Result<()> {
    let task = TaskInput::from(args).into_draft()?;
    let outcome = app.editor().save_task(task).await?;
    write_saved(&mut writer, "Added", &outcome)
}

async fn handle_edit<W: Write>(app: &App, args: &EditArgs, mut writer: W) -> Result<()> {
    let input = TaskInput::from(args);
    if input.is_empty() {
        return Err(anyhow!("Nothing to change; pass --title, --description or --due"));
    }
    let editor = app.editor();
    let mut task = editor
        .task_by_id(args.id)
        .await?
        .ok_or_else(|| anyhow!("Task {} not found", args.id))?;
    input.apply_to(&mut task)?;
    let outcome = editor.save_task(task).await?;
    write_saved(&mut writer, "Updated", &outcome)
}

async fn handle_list<W: Write>(app: &App, args: &ListArgs, mut writer: W) -> Result<()> {
    let search = args.search.as_deref().unwrap_or("");
    let home = app.home();
    let mut tasks = home.load_tasks(search).await?;
    if args.upcoming {
        let now = Utc::now();
        tasks.retain(|task| task.due_date > now);
    }

    if args.json {
        serde_json::to_writer_pretty(&mut writer, &tasks).context("failed to encode tasks")?;
        writeln!(writer)?;
        return Ok(());
    }

    if tasks.is_empty() {
        writeln!(writer, "No tasks")?;
        return Ok(());
    }
    for task in &tasks {
        writeln!(writer, "{}", TaskRow(task))?;
    }
    Ok(())
}

async fn handle_show<W: Write>(app: &App, args: &ShowArgs, mut writer: W) -> Result<()> {
    let task = app
        .home()
        .task_by_id(args.id)
        .await?
        .ok_or_else(|| anyhow!("Task {} not found", args.id))?;

    if args.json {
        serde_json::to_writer_pretty(&mut writer, &task).context("failed to encode task")?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "{}", TaskRow(&task))?;
    if !task.description.is_empty() {
        writeln!(writer, "    {}", task.description)?;
    }
    Ok(())
}

async fn handle_completion<W: Write>(
    app: &App,
    args: &IdsArgs,
    completed: bool,
    mut writer: W,
) -> Result<()> {
    let home = app.home();
    let mut changed = 0usize;
    let mut missing = Vec::new();
    for &id in &args.ids {
        match home.set_completed(id, completed).await? {
            Some(_) => changed += 1,
            None => missing.push(id),
        }
    }
    let verb = if completed { "Completed" } else { "Reopened" };
    writeln!(writer, "{} {}", verb, plural_tasks(changed))?;
    write_missing(&mut writer, &missing)
}

async fn handle_delete<W: Write>(app: &App, args: &IdsArgs, mut writer: W) -> Result<()> {
    let results = app.home().delete_tasks(&args.ids).await?;
    let summary = DeleteSummary::from_results(&results);
    summary.write_to(&mut writer)?;
    Ok(())
}

async fn handle_clear<W: Write>(app: &App, mut writer: W) -> Result<()> {
    let deleted = app.home().delete_all_tasks().await?;
    writeln!(writer, "{}", SummaryLine::deleted(deleted))?;
    Ok(())
}

fn write_saved<W: Write>(mut writer: W, verb: &str, outcome: &SaveOutcome) -> Result<()> {
    let task = &outcome.task;
    writeln!(
        writer,
        "{} task {}: {} (due {})",
        verb,
        task.id.unwrap_or_default(),
        task.title,
        task.formatted_due_date()
    )?;
    if let Some(note) = reminder_note(&outcome.reminder) {
        writeln!(writer, "{}", note)?;
    }
    Ok(())
}

fn reminder_note(status: &ReminderStatus) -> Option<String> {
    match status {
        ReminderStatus::Scheduled(plan) => Some(format!(
            "Reminders at {} and {} (delivered by `taskminder watch`)",
            format_due_date(plan.early_at, &chrono::Local),
            format_due_date(plan.due_at, &chrono::Local)
        )),
        ReminderStatus::PermissionDenied => {
            Some("Reminders are disabled; the task was saved without alarms".to_string())
        }
        ReminderStatus::Skipped(SkipReason::Completed) => None,
        ReminderStatus::Skipped(reason) => Some(format!("No reminders ({:?})", reason)),
    }
}

fn write_missing<W: Write>(mut writer: W, missing: &[TaskId]) -> Result<()> {
    if !missing.is_empty() {
        let ids: Vec<String> = missing.iter().map(|id| id.to_string()).collect();
        writeln!(writer, "Not found: {}", ids.join(", "))?;
    }
    Ok(())
}

fn plural_tasks(count: usize) -> String {
    format!("{} task{}", count, if count == 1 { "" } else { "s" })
}

/// One line of `list` output: `[x]   3  18/10/2026 09:00  Buy milk`.
struct TaskRow<'a>(&'a Task);

impl fmt::Display for TaskRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.0;
        write!(
            f,
            "[{}] {:>3}  {}  {}",
            if task.completed { "x" } else { " " },
            task.id.unwrap_or_default(),
            task.formatted_due_date(),
            task.title
        )
    }
}

struct DeleteSummary {
    deleted: usize,
    missing: Vec<TaskId>,
}

impl DeleteSummary {
    fn from_results(results: &[DeleteResult]) -> Self {
        let mut deleted = 0usize;
        let mut missing = Vec::new();
        for result in results {
            if result.deleted {
                deleted += 1;
            } else {
                missing.push(result.id);
            }
        }
        Self { deleted, missing }
    }

    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted))?;
        write_missing(&mut writer, &self.missing)
    }
}

enum SummaryLine {
    Deleted(usize),
    NoneDeleted,
}

impl SummaryLine {
    fn deleted(count: usize) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count)
        } else {
            SummaryLine::NoneDeleted
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count) => write!(f, "Deleted {}", plural_tasks(*count)),
            SummaryLine::NoneDeleted => write!(f, "No tasks deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use tempfile::TempDir;

    fn temp_config() -> (AppConfig, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
        (config, dir)
    }

    async fn run(config: &AppConfig, argv: &[&str]) -> Result<String> {
        let cli = Cli::parse_from(std::iter::once("taskminder").chain(argv.iter().copied()));
        let command = cli.command.expect("command");
        let mut output = Vec::new();
        execute(config, command, &mut output).await?;
        Ok(String::from_utf8(output).expect("utf8"))
    }

    #[tokio::test]
    async fn add_then_list_by_title() {
        let (config, _dir) = temp_config();
        let output = run(&config, &["add", "Buy", "milk", "--due", "+1d"]).await.unwrap();
        assert!(output.starts_with("Added task 1: Buy milk (due "));
        assert!(output.contains("Reminders at "));
        run(&config, &["add", "Call", "mom", "--due", "+2d"]).await.unwrap();

        let listed = run(&config, &["list", "MILK"]).await.unwrap();
        assert_eq!(listed.lines().count(), 1);
        assert!(listed.contains("Buy milk"));
        assert!(listed.starts_with("[ ]   1  "));
    }

    #[tokio::test]
    async fn add_rejects_missing_or_past_due_date() {
        let (config, _dir) = temp_config();
        let err = run(&config, &["add", "Someday"]).await.unwrap_err();
        assert_eq!(err.to_string(), "Due date is not set");
        let err = run(&config, &["add", "Late", "--due", "2001-01-01"]).await.unwrap_err();
        assert_eq!(err.to_string(), "Due date must be in the future");
        let err = run(&config, &["add", "   ", "--due", "+1h"]).await.unwrap_err();
        assert_eq!(err.to_string(), "Title cannot be empty");
        assert!(run(&config, &["list"]).await.unwrap().contains("No tasks"));
    }

    #[tokio::test]
    async fn edit_changes_only_given_fields() {
        let (config, _dir) = temp_config();
        run(&config, &["add", "Dentist", "-d", "bring card", "--due", "+3d"])
            .await
            .unwrap();
        let output = run(&config, &["edit", "1", "--title", "Dentist appointment"])
            .await
            .unwrap();
        assert!(output.starts_with("Updated task 1: Dentist appointment"));

        let shown = run(&config, &["show", "1", "--json"]).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&shown).unwrap();
        assert_eq!(json["title"], "Dentist appointment");
        assert_eq!(json["description"], "bring card");

        assert!(run(&config, &["edit", "1"]).await.is_err());
        let err = run(&config, &["edit", "9", "--title", "x"]).await.unwrap_err();
        assert_eq!(err.to_string(), "Task 9 not found");
    }

    #[tokio::test]
    async fn done_and_undone_report_missing_ids() {
        let (config, _dir) = temp_config();
        run(&config, &["add", "Stretch", "--due", "+1h"]).await.unwrap();

        let output = run(&config, &["done", "1", "42"]).await.unwrap();
        assert!(output.contains("Completed 1 task"));
        assert!(output.contains("Not found: 42"));
        assert!(run(&config, &["list"]).await.unwrap().starts_with("[x]"));

        let output = run(&config, &["undone", "1"]).await.unwrap();
        assert!(output.contains("Reopened 1 task"));
    }

    #[tokio::test]
    async fn delete_command_reports_deleted_and_missing() {
        let (config, _dir) = temp_config();
        run(&config, &["add", "Test", "--due", "+1d"]).await.unwrap();

        let output = run(&config, &["delete", "1", "404"]).await.unwrap();
        assert!(output.contains("Deleted 1 task"));
        assert!(output.contains("Not found: 404"));

        let output = run(&config, &["delete", "1"]).await.unwrap();
        assert!(output.contains("No tasks deleted"));
    }

    #[tokio::test]
    async fn clear_and_json_listing() {
        let (config, _dir) = temp_config();
        run(&config, &["add", "a", "--due", "+1d"]).await.unwrap();
        run(&config, &["add", "b", "--due", "+2d"]).await.unwrap();

        let json = run(&config, &["list", "--json", "--upcoming"]).await.unwrap();
        let tasks: Vec<Task> = serde_json::from_str(&json).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "a");

        assert!(run(&config, &["clear"]).await.unwrap().contains("Deleted 2 tasks"));
        assert!(run(&config, &["clear"]).await.unwrap().contains("No tasks deleted"));
    }

    #[test]
    fn reminder_note_mentions_denied_permission() {
        assert!(reminder_note(&ReminderStatus::PermissionDenied)
            .unwrap()
            .contains("disabled"));
        assert!(reminder_note(&ReminderStatus::Skipped(SkipReason::Completed)).is_none());
    }
}
