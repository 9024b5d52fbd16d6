pub mod capture;
pub mod config;
pub mod database;
pub mod model;
pub mod parser;
pub mod reminders;
pub mod repository;
pub mod services;

pub use capture::{CaptureError, TaskInput};
pub use config::{AppConfig, ReminderSettings};
pub use database::Database;
pub use model::*;
pub use reminders::{
    AlarmService, DispatchOutcome, NotificationDispatcher, NotificationTray, Notifier,
    ReminderScheduler, TokioAlarmService,
};
pub use repository::TaskRepository;
pub use services::{EditError, EditInteractor, HomeInteractor, ReminderStatus, SaveOutcome};
