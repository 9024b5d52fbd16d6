use std::path::PathBuf;

use clap::{value_parser, Args, Parser, Subcommand};

use crate::core::config::MAX_EARLY_MINUTES;
use crate::core::{TaskId, TaskInput};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskminder",
    version,
    about = "A small to-do list with due-date reminders.",
    after_help = "Examples:\n  taskminder add Buy milk --due tomorrow\n  taskminder list milk\n  taskminder done 3\n  taskminder watch"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the tracing filter (e.g. "info", "debug", or full directives)
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    /// Minutes before the due date the early reminder fires
    #[arg(long = "early-minutes", value_name = "MINUTES", global = true, value_parser = value_parser!(u32).range(0..=MAX_EARLY_MINUTES))]
    pub early_minutes: Option<u32>,

    /// Save tasks without registering reminder alarms
    #[arg(long = "no-reminders", global = true)]
    pub no_reminders: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Create a task
    Add(AddArgs),
    /// Change the title, description or due date of a task
    Edit(EditArgs),
    /// List tasks, optionally filtered by title (default command)
    List(ListArgs),
    /// Print one task
    Show(ShowArgs),
    /// Mark tasks complete and cancel their reminders
    Done(IdsArgs),
    /// Reopen completed tasks and schedule their reminders again
    Undone(IdsArgs),
    /// Delete one or more tasks by id
    Delete(IdsArgs),
    /// Delete every task
    Clear,
    /// Stay in the foreground and print reminders as they fire
    Watch(WatchArgs),
}

impl CliCommand {
    /// Tracing directive used when `--log` is not given.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            CliCommand::Watch(_) => "info",
            _ => "warn",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title
    #[arg(value_name = "TITLE", required = true)]
    pub title: Vec<String>,

    /// Optional longer description
    #[arg(long, short)]
    pub description: Option<String>,

    /// Due date (2026-12-24 18:00, 24/12/2026 18:00, tomorrow, fri 09:30, +2h)
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "ID")]
    pub id: TaskId,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description (pass "" to clear)
    #[arg(long, short)]
    pub description: Option<String>,

    /// New due date
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only tasks whose title contains this text (case-insensitive)
    #[arg(value_name = "SEARCH")]
    pub search: Option<String>,

    /// Only tasks due in the future
    #[arg(long)]
    pub upcoming: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(value_name = "ID")]
    pub id: TaskId,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IdsArgs {
    /// One or more task ids
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<TaskId>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// How often (seconds) to pick up tasks changed by other taskminder processes
    #[arg(long = "resync", value_name = "SECONDS", default_value_t = 30, value_parser = value_parser!(u64).range(1..))]
    pub resync_secs: u64,
}

impl From<AddArgs> for TaskInput {
    fn from(args: AddArgs) -> Self {
        TaskInput {
            title: args.title,
            description: args.description,
            due: args.due,
        }
    }
}

impl From<&EditArgs> for TaskInput {
    fn from(args: &EditArgs) -> Self {
        TaskInput {
            title: args.title.iter().cloned().collect(),
            description: args.description.clone(),
            due: args.due.clone(),
        }
    }
}
