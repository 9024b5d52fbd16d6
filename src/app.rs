use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::core::reminders::AlarmReceiver;
use crate::core::{
    EditInteractor, HomeInteractor, NotificationDispatcher, Notifier, ReminderScheduler,
    TaskRepository, TokioAlarmService,
};

/// The wired object graph shared by every command.
pub struct App {
    config: AppConfig,
    repository: TaskRepository,
    scheduler: Arc<ReminderScheduler>,
    alarms: Arc<TokioAlarmService>,
    notifier: Arc<dyn Notifier>,
}

impl App {
    /// Open the store and start an alarm service on the current tokio runtime.
    pub fn open(config: AppConfig, notifier: Arc<dyn Notifier>) -> Result<(Self, AlarmReceiver)> {
        let repository = TaskRepository::open(&config).context("failed to open task store")?;
        let settings = config.reminders();
        let (alarms, receiver) = TokioAlarmService::new(settings.exact_alarms)?;
        let alarms = Arc::new(alarms);
        let scheduler = Arc::new(ReminderScheduler::new(
            alarms.clone(),
            notifier.clone(),
            settings,
        ));
        let app = Self {
            config,
            repository,
            scheduler,
            alarms,
            notifier,
        };
        Ok((app, receiver))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn home(&self) -> HomeInteractor {
        HomeInteractor::new(self.repository.clone(), self.scheduler.clone())
    }

    pub fn editor(&self) -> EditInteractor {
        EditInteractor::new(self.repository.clone(), self.scheduler.clone())
    }

    pub fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(
            self.repository.clone(),
            self.scheduler.clone(),
            self.notifier.clone(),
        )
    }

    pub fn pending_alarms(&self) -> usize {
        self.alarms.pending_count()
    }
}
