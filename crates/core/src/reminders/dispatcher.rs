use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::model::{AlarmFired, Notification, NotificationKind, TaskId};
use crate::reminders::scheduler::{AlarmReceiver, ReminderScheduler};
use crate::repository::TaskRepository;

/// Surface that shows reminders to the user. One active notification per task.
pub trait Notifier: Send + Sync {
    /// Show `notification`, replacing any active one for the same task.
    fn notify(&self, notification: &Notification) -> Result<()>;

    fn dismiss(&self, task_id: TaskId) -> Result<()>;
}

/// Notifier that keeps active notifications in memory.
#[derive(Debug, Default)]
pub struct NotificationTray {
    active: Mutex<BTreeMap<TaskId, Notification>>,
}

impl NotificationTray {
    pub fn active(&self) -> Vec<Notification> {
        self.active.lock().values().cloned().collect()
    }

    pub fn get(&self, task_id: TaskId) -> Option<Notification> {
        self.active.lock().get(&task_id).cloned()
    }
}

impl Notifier for NotificationTray {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.active
            .lock()
            .insert(notification.task_id, notification.clone());
        Ok(())
    }

    fn dismiss(&self, task_id: TaskId) -> Result<()> {
        self.active.lock().remove(&task_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Shown(Notification),
    TaskMissing,
    AlreadyCompleted,
}

/// Turns fired alarms into notifications, re-reading the task first so a
/// reminder is never shown for a task completed or deleted after scheduling.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repository: TaskRepository,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(
        repository: TaskRepository,
        scheduler: Arc<ReminderScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            scheduler,
            notifier,
        }
    }

    pub async fn on_alarm(&self, fired: AlarmFired) -> Result<DispatchOutcome> {
        let Some(task) = self.repository.task_by_id(fired.task_id).await? else {
            tracing::debug!(task_id = fired.task_id, kind = %fired.kind, "alarm for missing task");
            return Ok(DispatchOutcome::TaskMissing);
        };
        if task.completed {
            tracing::debug!(task_id = fired.task_id, kind = %fired.kind, "alarm for completed task");
            return Ok(DispatchOutcome::AlreadyCompleted);
        }

        let kind = NotificationKind::from(fired.kind);
        let notification = Notification::for_task(fired.task_id, &task, kind);
        self.notifier.notify(&notification)?;
        tracing::info!(
            task_id = fired.task_id,
            kind = kind.as_str(),
            title = task.title.as_str(),
            "reminder shown"
        );
        Ok(DispatchOutcome::Shown(notification))
    }

    /// The notification's "mark complete" action. Returns false when the task no longer exists.
    pub async fn mark_complete(&self, task_id: TaskId) -> Result<bool> {
        let updated = self.repository.set_completed(task_id, true).await?;
        self.scheduler.cancel(task_id);
        tracing::info!(task_id, updated, "task completed from notification");
        Ok(updated)
    }

    /// Dispatch fired alarms until every sender is gone.
    pub async fn run(self, mut alarms: AlarmReceiver) {
        while let Some(fired) = alarms.recv().await {
            if let Err(err) = self.on_alarm(fired).await {
                tracing::warn!(
                    task_id = fired.task_id,
                    kind = %fired.kind,
                    error = %err,
                    "failed to dispatch reminder"
                );
            }
        }
    }
}
