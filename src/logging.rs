use anyhow::{Context, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` directives are layered on top of
/// `filter` (or `default_filter` when no `--log` was given).
pub fn init_tracing(filter: Option<String>, default_filter: &str) -> Result<()> {
    let filter = filter.unwrap_or_else(|| default_filter.to_string());
    let directive: Directive = filter
        .parse()
        .with_context(|| format!("invalid log directive '{}'", filter))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directive() {
        assert!(init_tracing(Some("taskminder=loud".into()), "warn").is_err());
        assert!(init_tracing(None, "warn").is_ok());
    }
}
