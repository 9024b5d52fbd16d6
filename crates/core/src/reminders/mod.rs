pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{DispatchOutcome, NotificationDispatcher, NotificationTray, Notifier};
pub use scheduler::{
    plan_reminders, AlarmReceiver, AlarmService, ReminderPlan, ReminderScheduler, ScheduleError,
    ScheduleOutcome, SkipReason, TokioAlarmService,
};
