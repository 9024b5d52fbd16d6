use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::Task;
use crate::parser;

/// Normalized input for creating or editing a task from any client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub title: Vec<String>,
    pub description: Option<String>,
    pub due: Option<String>,
}

impl TaskInput {
    pub fn title_text(&self) -> Option<String> {
        let joined = self.title.join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Build an unsaved task. A missing due date is left at the Unix epoch so the
    /// edit validation reports it.
    pub fn into_draft(self) -> Result<Task, CaptureError> {
        let due_date = match self.due.as_deref() {
            Some(spec) => parse_due(spec)?,
            None => DateTime::<Utc>::UNIX_EPOCH,
        };
        Ok(Task::new(
            self.title_text().unwrap_or_default(),
            self.description.unwrap_or_default(),
            due_date,
        ))
    }

    /// Overwrite the fields this input carries, leaving the rest of `task` alone.
    pub fn apply_to(&self, task: &mut Task) -> Result<(), CaptureError> {
        if let Some(title) = self.title_text() {
            task.title = title;
        }
        if let Some(description) = &self.description {
            task.description = description.trim().to_string();
        }
        if let Some(spec) = self.due.as_deref() {
            task.set_due_date(parse_due(spec)?);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title_text().is_none() && self.description.is_none() && self.due.is_none()
    }
}

fn parse_due(spec: &str) -> Result<DateTime<Utc>, CaptureError> {
    parser::parse_due_spec(spec).map_err(|err| CaptureError::InvalidDue(err.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    InvalidDue(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::InvalidDue(reason) => write!(f, "Invalid due date: {}", reason),
        }
    }
}

impl std::error::Error for CaptureError {}
