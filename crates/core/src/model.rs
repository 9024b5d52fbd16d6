use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Row identifier assigned by the store on insert.
pub type TaskId = i64;

/// Display format used wherever a due date is shown to the user.
pub const DUE_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<TaskId>,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_date: DateTime<Utc>,
    pub completed: bool,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            due_date: truncate_to_millis(due_date),
            completed: false,
        }
    }

    /// The identifier, if this task has been stored. Zero and negative ids count as unsaved.
    pub fn saved_id(&self) -> Option<TaskId> {
        self.id.filter(|id| *id > 0)
    }

    pub fn has_id(&self) -> bool {
        self.saved_id().is_some()
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn set_due_date(&mut self, due_date: DateTime<Utc>) {
        self.due_date = truncate_to_millis(due_date);
    }

    pub fn due_millis(&self) -> i64 {
        self.due_date.timestamp_millis()
    }

    pub fn formatted_due_date(&self) -> String {
        format_due_date(self.due_date, &Local)
    }
}

/// Render `due` in `tz` with [`DUE_DATE_FORMAT`].
pub fn format_due_date<Tz>(due: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    due.with_timezone(tz).format(DUE_DATE_FORMAT).to_string()
}

/// Drop sub-millisecond precision so an instant survives the epoch-millis column unchanged.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

/// Which of the two per-task triggers an alarm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Early,
    Due,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::Early, ReminderKind::Due];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Early => "early",
            ReminderKind::Due => "due",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReminderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "early" => Ok(ReminderKind::Early),
            "due" => Ok(ReminderKind::Due),
            other => Err(anyhow!(
                "Unknown reminder kind '{}': expected early|due",
                other
            )),
        }
    }
}

/// Identity of one outstanding trigger. Registering the same key again replaces the old trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmKey {
    pub task_id: TaskId,
    pub kind: ReminderKind,
}

impl AlarmKey {
    pub fn new(task_id: TaskId, kind: ReminderKind) -> Self {
        Self { task_id, kind }
    }

    pub fn pair(task_id: TaskId) -> [AlarmKey; 2] {
        ReminderKind::ALL.map(|kind| AlarmKey::new(task_id, kind))
    }
}

impl fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.task_id)
    }
}

/// Delivered by an alarm service when a trigger's instant is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmFired {
    pub task_id: TaskId,
    pub kind: ReminderKind,
}

impl From<AlarmKey> for AlarmFired {
    fn from(key: AlarmKey) -> Self {
        Self {
            task_id: key.task_id,
            kind: key.kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Upcoming,
    DueNow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Upcoming => "upcoming",
            NotificationKind::DueNow => "due now",
        }
    }
}

impl From<ReminderKind> for NotificationKind {
    fn from(kind: ReminderKind) -> Self {
        match kind {
            ReminderKind::Early => NotificationKind::Upcoming,
            ReminderKind::Due => NotificationKind::DueNow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    MarkComplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub task_id: TaskId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn for_task(task_id: TaskId, task: &Task, kind: NotificationKind) -> Self {
        let message = match kind {
            NotificationKind::Upcoming => format!("Due at {}", task.formatted_due_date()),
            NotificationKind::DueNow => "Due now".to_string(),
        };
        Self {
            task_id,
            kind,
            title: task.title.clone(),
            message,
            actions: vec![NotificationAction::MarkComplete],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub id: TaskId,
    pub deleted: bool,
}
