use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{Task, TaskId};
use crate::reminders::{ReminderPlan, ReminderScheduler, ScheduleError, ScheduleOutcome, SkipReason};
use crate::repository::TaskRepository;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Due date is not set")]
    InvalidDate,
    #[error("Due date must be in the future")]
    PastDate,
    #[error("Task {0} not found")]
    NotFound(TaskId),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// What happened to a saved task's reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    Scheduled(ReminderPlan),
    Skipped(SkipReason),
    PermissionDenied,
}

impl From<Result<ScheduleOutcome, ScheduleError>> for ReminderStatus {
    fn from(result: Result<ScheduleOutcome, ScheduleError>) -> Self {
        match result {
            Ok(ScheduleOutcome::Scheduled(plan)) => ReminderStatus::Scheduled(plan),
            Ok(ScheduleOutcome::Skipped(reason)) => ReminderStatus::Skipped(reason),
            Err(ScheduleError::PermissionDenied { .. }) => ReminderStatus::PermissionDenied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub task: Task,
    pub reminder: ReminderStatus,
}

/// Check a task before it is written.
pub fn validate_task(task: &Task, now: DateTime<Utc>) -> Result<(), EditError> {
    if task.title.trim().is_empty() {
        return Err(EditError::EmptyTitle);
    }
    if task.due_millis() <= 0 {
        return Err(EditError::InvalidDate);
    }
    if task.due_date <= now {
        return Err(EditError::PastDate);
    }
    Ok(())
}

/// Create-or-update flow behind the edit screen.
#[derive(Clone)]
pub struct EditInteractor {
    repository: TaskRepository,
    scheduler: Arc<ReminderScheduler>,
}

impl EditInteractor {
    pub fn new(repository: TaskRepository, scheduler: Arc<ReminderScheduler>) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub async fn task_by_id(&self, id: TaskId) -> Result<Option<Task>, EditError> {
        Ok(self.repository.task_by_id(id).await?)
    }

    pub async fn save_task(&self, task: Task) -> Result<SaveOutcome, EditError> {
        self.save_task_at(task, Utc::now()).await
    }

    pub async fn save_task_at(
        &self,
        mut task: Task,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, EditError> {
        task.title = task.title.trim().to_string();
        validate_task(&task, now)?;

        let task = match task.saved_id() {
            Some(id) => {
                if !self.repository.update_task(task.clone()).await? {
                    return Err(EditError::NotFound(id));
                }
                task
            }
            None => self.repository.insert_task(task).await?,
        };

        let id = task.id.ok_or_else(|| anyhow::anyhow!("saved task has no identifier"))?;
        self.scheduler.cancel(id);
        let reminder = ReminderStatus::from(self.scheduler.schedule_at(&task, now));
        tracing::debug!(task_id = id, ?reminder, "task saved");
        Ok(SaveOutcome { task, reminder })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ReminderSettings};
    use crate::reminders::{AlarmService, NotificationTray, TokioAlarmService};
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_800_000_000_000).unwrap()
    }

    #[rstest]
    #[case("", Duration::hours(1), "EmptyTitle")]
    #[case("   ", Duration::hours(1), "EmptyTitle")]
    #[case("Pay rent", Duration::zero(), "PastDate")]
    #[case("Pay rent", Duration::minutes(-5), "PastDate")]
    fn rejects_invalid_input(
        #[case] title: &str,
        #[case] due_in: Duration,
        #[case] expected: &str,
    ) {
        let task = Task::new(title, "", now() + due_in);
        let err = validate_task(&task, now()).unwrap_err();
        assert_eq!(format!("{:?}", err), expected);
    }

    #[test]
    fn unset_due_date_is_invalid() {
        let task = Task::new("Someday", "", DateTime::<Utc>::UNIX_EPOCH);
        assert!(matches!(
            validate_task(&task, now()),
            Err(EditError::InvalidDate)
        ));
        assert!(validate_task(&Task::new("Soon", "", now() + Duration::seconds(1)), now()).is_ok());
    }

    struct Fixture {
        interactor: EditInteractor,
        repository: TaskRepository,
        alarms: Arc<TokioAlarmService>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
        let repository = TaskRepository::open(&config).expect("repository");
        let (alarms, _receiver) = TokioAlarmService::new(true).expect("alarms");
        let alarms = Arc::new(alarms);
        let scheduler = Arc::new(ReminderScheduler::new(
            alarms.clone(),
            Arc::new(NotificationTray::default()),
            ReminderSettings::default(),
        ));
        Fixture {
            interactor: EditInteractor::new(repository.clone(), scheduler),
            repository,
            alarms,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn new_task_is_inserted_and_scheduled() {
        let f = fixture();
        let outcome = f
            .interactor
            .save_task(Task::new("  Buy milk ", "", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(outcome.task.title, "Buy milk");
        let id = outcome.task.id.expect("id assigned");
        assert!(matches!(outcome.reminder, ReminderStatus::Scheduled(_)));
        assert_eq!(f.alarms.pending_count(), 2);
        assert_eq!(f.repository.task_by_id(id).await.unwrap(), Some(outcome.task));
    }

    #[tokio::test]
    async fn past_date_is_not_persisted() {
        let f = fixture();
        let err = f
            .interactor
            .save_task(Task::new("Late", "", Utc::now() - Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::PastDate));
        assert_eq!(err.to_string(), "Due date must be in the future");
        assert!(f.repository.load_tasks("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_task_is_updated_and_rescheduled() {
        let f = fixture();
        let first = f
            .interactor
            .save_task(Task::new("Dentist", "", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let mut edited = first.task.clone();
        edited.description = "bring x-rays".into();
        edited.set_due_date(Utc::now() + Duration::days(3));
        let second = f.interactor.save_task(edited.clone()).await.unwrap();

        assert_eq!(second.task, edited);
        assert_eq!(f.alarms.pending_count(), 2);
        let stored = f.interactor.task_by_id(edited.id.unwrap()).await.unwrap();
        assert_eq!(stored.unwrap().description, "bring x-rays");
    }

    #[tokio::test]
    async fn update_of_missing_task_is_not_found() {
        let f = fixture();
        let ghost = Task::new("Ghost", "", Utc::now() + Duration::days(1)).with_id(31);
        let err = f.interactor.save_task(ghost).await.unwrap_err();
        assert!(matches!(err, EditError::NotFound(31)));
    }

    #[tokio::test]
    async fn zero_id_is_saved_as_a_new_task() {
        let f = fixture();
        let draft = Task::new("Fresh", "", Utc::now() + Duration::days(1)).with_id(0);
        let outcome = f.interactor.save_task(draft).await.unwrap();

        let id = outcome.task.saved_id().expect("id assigned");
        assert!(id > 0);
        assert_eq!(f.repository.load_tasks("").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denied_permission_still_saves() {
        let f = fixture();
        f.alarms.set_exact_alarms_allowed(false);
        let outcome = f
            .interactor
            .save_task(Task::new("Call bank", "", Utc::now() + Duration::hours(2)))
            .await
            .unwrap();
        assert_eq!(outcome.reminder, ReminderStatus::PermissionDenied);
        assert!(outcome.task.has_id());
        assert!(!f.alarms.can_schedule_exact_alarms());
        assert_eq!(f.alarms.pending_count(), 0);
    }
}
