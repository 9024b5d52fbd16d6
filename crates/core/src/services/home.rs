use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{DeleteResult, Task, TaskId};
use crate::reminders::{ReminderScheduler, ScheduleOutcome};
use crate::repository::TaskRepository;
use crate::services::edit::ReminderStatus;

/// List screen flows: browsing, completion toggles, deletes and undo.
#[derive(Clone)]
pub struct HomeInteractor {
    repository: TaskRepository,
    scheduler: Arc<ReminderScheduler>,
}

impl HomeInteractor {
    pub fn new(repository: TaskRepository, scheduler: Arc<ReminderScheduler>) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.repository.subscribe()
    }

    pub async fn load_tasks(&self, title: &str) -> Result<Vec<Task>> {
        self.repository.load_tasks(title).await
    }

    pub async fn task_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        self.repository.task_by_id(id).await
    }

    pub async fn upcoming_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        self.repository.upcoming_tasks(now).await
    }

    /// Completing cancels the task's reminders; reopening schedules them again.
    /// Returns the updated task, or `None` when it does not exist.
    pub async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Option<Task>> {
        if !self.repository.set_completed(id, completed).await? {
            return Ok(None);
        }
        if completed {
            self.scheduler.cancel(id);
        }
        let task = self.repository.task_by_id(id).await?;
        if let (false, Some(task)) = (completed, &task) {
            let status = ReminderStatus::from(self.scheduler.schedule(task));
            tracing::debug!(task_id = id, ?status, "task reopened");
        }
        Ok(task)
    }

    /// Delete and hand back the removed task so the caller can offer undo.
    pub async fn delete_task_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        let Some(task) = self.repository.task_by_id(id).await? else {
            return Ok(None);
        };
        self.scheduler.cancel(id);
        if !self.repository.delete_task_by_id(id).await? {
            return Ok(None);
        }
        Ok(Some(task))
    }

    pub async fn delete_tasks(&self, ids: &[TaskId]) -> Result<Vec<DeleteResult>> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let deleted = self.delete_task_by_id(id).await?.is_some();
            results.push(DeleteResult { id, deleted });
        }
        Ok(results)
    }

    /// Undo of a delete: put the task back under its old identifier.
    pub async fn restore_task(&self, task: Task) -> Result<(Task, ReminderStatus)> {
        let restored = self.repository.insert_task(task).await?;
        let status = ReminderStatus::from(self.scheduler.schedule(&restored));
        tracing::debug!(task_id = ?restored.id, ?status, "task restored");
        Ok((restored, status))
    }

    pub async fn delete_all_tasks(&self) -> Result<usize> {
        for task in self.repository.all_tasks().await? {
            if let Some(id) = task.id {
                self.scheduler.cancel(id);
            }
        }
        self.repository.delete_all_tasks().await
    }

    /// Make sure every incomplete task still ahead of `now` has its reminders.
    /// Safe to call repeatedly: reminders already armed for a task's current
    /// due date are not armed again. Returns how many tasks have reminders.
    pub async fn reschedule_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut scheduled = 0;
        for task in self.repository.upcoming_tasks(now).await? {
            match self.scheduler.resume_at(&task, now) {
                Ok(ScheduleOutcome::Scheduled(_)) => scheduled += 1,
                Ok(ScheduleOutcome::Skipped(_)) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "stopped rescheduling reminders");
                    break;
                }
            }
        }
        tracing::debug!(scheduled, "pending reminders rescheduled");
        Ok(scheduled)
    }
}
