pub use crate::core::config::*;

use chrono::Duration;

use crate::cli::Cli;

/// Resolve the data directory, then apply the reminder flags from the command line.
pub fn from_cli(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::discover(cli.data_dir.clone())?;
    if let Some(minutes) = cli.early_minutes {
        config = config.with_early_offset(Duration::minutes(i64::from(minutes)));
    }
    if cli.no_reminders {
        config = config.with_exact_alarms(false);
    }
    Ok(config)
}
