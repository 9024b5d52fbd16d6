use anyhow::{Context, Result};
use clap::Parser;

use taskminder::cli::{Cli, CliCommand, ListArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| CliCommand::List(ListArgs::default()));
    taskminder::logging::init_tracing(cli.log_filter.clone(), command.default_log_filter())?;
    let config = taskminder::config::from_cli(&cli).context("failed to resolve configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(async {
        match command {
            CliCommand::Watch(args) => taskminder::watch::run(config, args).await,
            command => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                taskminder::commands::execute(&config, command, &mut handle).await
            }
        }
    });
    // The stdin reader in `watch` sits on a blocking thread that never finishes on its own.
    runtime.shutdown_background();
    result
}
