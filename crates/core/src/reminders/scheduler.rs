use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ReminderSettings;
use crate::model::{AlarmFired, AlarmKey, ReminderKind, Task, TaskId};
use crate::reminders::dispatcher::Notifier;

/// Timer facility that holds one-shot triggers outside the task store.
pub trait AlarmService: Send + Sync {
    /// Whether precisely-timed triggers may be registered right now.
    fn can_schedule_exact_alarms(&self) -> bool;

    /// Register a trigger for `key` at `at`, replacing any earlier trigger with the same key.
    fn set_exact(&self, key: AlarmKey, at: DateTime<Utc>);

    fn cancel(&self, key: AlarmKey);

    fn is_pending(&self, key: AlarmKey) -> bool;
}

/// The two trigger instants derived for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPlan {
    pub task_id: TaskId,
    pub early_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl ReminderPlan {
    pub fn triggers(&self) -> [(AlarmKey, DateTime<Utc>); 2] {
        [
            (AlarmKey::new(self.task_id, ReminderKind::Early), self.early_at),
            (AlarmKey::new(self.task_id, ReminderKind::Due), self.due_at),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Completed,
    NotPersisted,
    DueInPast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(ReminderPlan),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("exact alarm permission is not granted; reminders for task {task_id} were not scheduled")]
    PermissionDenied { task_id: TaskId },
}

/// Compute the reminder pair for `task` as seen at `now`.
///
/// Completed tasks, unsaved tasks and tasks due at or before `now` get no
/// reminders. The early trigger never lands before `now`.
pub fn plan_reminders(
    task: &Task,
    early_offset: Duration,
    now: DateTime<Utc>,
) -> Result<ReminderPlan, SkipReason> {
    if task.completed {
        return Err(SkipReason::Completed);
    }
    let Some(task_id) = task.saved_id() else {
        return Err(SkipReason::NotPersisted);
    };
    if task.due_date <= now {
        return Err(SkipReason::DueInPast);
    }
    let early_at = task
        .due_date
        .checked_sub_signed(early_offset)
        .map_or(now, |early| early.max(now));
    Ok(ReminderPlan {
        task_id,
        early_at,
        due_at: task.due_date,
    })
}

pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmService>,
    notifier: Arc<dyn Notifier>,
    early_offset: Duration,
    /// Due date each key was last armed for, fired or not.
    armed: Mutex<HashMap<AlarmKey, DateTime<Utc>>>,
}

impl ReminderScheduler {
    pub fn new(
        alarms: Arc<dyn AlarmService>,
        notifier: Arc<dyn Notifier>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            alarms,
            notifier,
            early_offset: settings.early_offset,
            armed: Mutex::new(HashMap::new()),
        }
    }

    pub fn early_offset(&self) -> Duration {
        self.early_offset
    }

    pub fn schedule(&self, task: &Task) -> Result<ScheduleOutcome, ScheduleError> {
        self.schedule_at(task, Utc::now())
    }

    pub fn schedule_at(
        &self,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let plan = match plan_reminders(task, self.early_offset, now) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::debug!(task_id = ?task.id, ?reason, "reminders skipped");
                return Ok(ScheduleOutcome::Skipped(reason));
            }
        };

        if !self.alarms.can_schedule_exact_alarms() {
            tracing::warn!(task_id = plan.task_id, "exact alarm permission denied");
            return Err(ScheduleError::PermissionDenied {
                task_id: plan.task_id,
            });
        }

        let mut armed = self.armed.lock();
        for (key, at) in plan.triggers() {
            self.alarms.set_exact(key, at);
            armed.insert(key, plan.due_at);
        }
        tracing::debug!(
            task_id = plan.task_id,
            early_at = %plan.early_at,
            due_at = %plan.due_at,
            "reminders scheduled"
        );
        Ok(ScheduleOutcome::Scheduled(plan))
    }

    /// Arm only the triggers not yet armed for the task's current due date.
    ///
    /// A trigger that already went off stays quiet until the due date moves,
    /// so periodic passes over the store never repeat a reminder. Saves go
    /// through [`Self::schedule_at`], which always arms both.
    pub fn resume_at(
        &self,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let plan = match plan_reminders(task, self.early_offset, now) {
            Ok(plan) => plan,
            Err(reason) => return Ok(ScheduleOutcome::Skipped(reason)),
        };

        let mut armed = self.armed.lock();
        let missing: Vec<_> = plan
            .triggers()
            .into_iter()
            .filter(|(key, _)| armed.get(key) != Some(&plan.due_at))
            .collect();
        if missing.is_empty() {
            return Ok(ScheduleOutcome::Scheduled(plan));
        }
        if !self.alarms.can_schedule_exact_alarms() {
            tracing::warn!(task_id = plan.task_id, "exact alarm permission denied");
            return Err(ScheduleError::PermissionDenied {
                task_id: plan.task_id,
            });
        }
        for (key, at) in &missing {
            self.alarms.set_exact(*key, *at);
            armed.insert(*key, plan.due_at);
        }
        tracing::debug!(
            task_id = plan.task_id,
            armed = missing.len(),
            "reminders resumed"
        );
        Ok(ScheduleOutcome::Scheduled(plan))
    }

    /// Drop both triggers for `task_id` and dismiss its notification.
    pub fn cancel(&self, task_id: TaskId) {
        if let Err(err) = self.notifier.dismiss(task_id) {
            tracing::warn!(task_id, error = %err, "failed to dismiss notification");
        }
        let mut armed = self.armed.lock();
        for key in AlarmKey::pair(task_id) {
            self.alarms.cancel(key);
            armed.remove(&key);
        }
        tracing::debug!(task_id, "reminders cancelled");
    }

    pub fn has_pending(&self, task_id: TaskId) -> bool {
        AlarmKey::pair(task_id)
            .into_iter()
            .any(|key| self.alarms.is_pending(key))
    }
}

/// Receiving end of a [`TokioAlarmService`].
pub type AlarmReceiver = mpsc::UnboundedReceiver<AlarmFired>;

/// In-process alarm service: one tokio timer per key, delivering fired
/// alarms on a channel. Timers do not survive the process.
pub struct TokioAlarmService {
    runtime: Handle,
    fired: mpsc::UnboundedSender<AlarmFired>,
    pending: Arc<Mutex<HashMap<AlarmKey, PendingAlarm>>>,
    generation: AtomicU64,
    exact_allowed: AtomicBool,
}

struct PendingAlarm {
    generation: u64,
    handle: JoinHandle<()>,
}

impl TokioAlarmService {
    /// Must be called from within a tokio runtime.
    pub fn new(exact_allowed: bool) -> Result<(Self, AlarmReceiver)> {
        let runtime = Handle::try_current().context("alarm service needs a tokio runtime")?;
        let (fired, receiver) = mpsc::unbounded_channel();
        let service = Self {
            runtime,
            fired,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            exact_allowed: AtomicBool::new(exact_allowed),
        };
        Ok((service, receiver))
    }

    pub fn set_exact_alarms_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl AlarmService for TokioAlarmService {
    fn can_schedule_exact_alarms(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    fn set_exact(&self, key: AlarmKey, at: DateTime<Utc>) {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let fired = self.fired.clone();
        let pending = self.pending.clone();

        let mut guard = self.pending.lock();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = pending.lock();
                if pending.get(&key).map(|p| p.generation) == Some(generation) {
                    pending.remove(&key);
                }
            }
            if fired.send(AlarmFired::from(key)).is_err() {
                tracing::debug!(alarm = %key, "alarm fired with no listener");
            }
        });
        if let Some(previous) = guard.insert(key, PendingAlarm { generation, handle }) {
            previous.handle.abort();
        }
    }

    fn cancel(&self, key: AlarmKey) {
        if let Some(previous) = self.pending.lock().remove(&key) {
            previous.handle.abort();
        }
    }

    fn is_pending(&self, key: AlarmKey) -> bool {
        self.pending.lock().contains_key(&key)
    }
}

impl Drop for TokioAlarmService {
    fn drop(&mut self) {
        for (_, alarm) in self.pending.lock().drain() {
            alarm.handle.abort();
        }
    }
}
