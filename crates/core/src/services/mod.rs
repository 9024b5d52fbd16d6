pub mod edit;
pub mod home;

pub use edit::{validate_task, EditError, EditInteractor, ReminderStatus, SaveOutcome};
pub use home::HomeInteractor;
