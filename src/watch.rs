//! Foreground reminder service.
//!
//! Alarm timers live only as long as this process, so `watch` re-arms every
//! pending task on start and again every `--resync` seconds to pick up tasks
//! that other `taskminder` invocations added or moved. Fired reminders are
//! printed; typing `done ID` is the notification's "mark complete" action.

use std::future::Future;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::app::App;
use crate::cli::WatchArgs;
use crate::config::AppConfig;
use crate::core::{Notification, NotificationDispatcher, NotificationTray, Notifier, TaskId};

/// Notifier that prints each reminder to a shared writer.
pub struct ConsoleNotifier<W> {
    out: Arc<Mutex<W>>,
    tray: NotificationTray,
}

impl<W: Write + Send> ConsoleNotifier<W> {
    pub fn new(out: Arc<Mutex<W>>) -> Self {
        Self {
            out,
            tray: NotificationTray::default(),
        }
    }

    pub fn active(&self) -> Vec<Notification> {
        self.tray.active()
    }
}

impl<W: Write + Send> Notifier for ConsoleNotifier<W> {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.tray.notify(notification)?;
        let mut out = self.out.lock();
        writeln!(
            out,
            "[{}] #{} {}: {} (type `done {}` to mark complete)",
            notification.kind.as_str(),
            notification.task_id,
            notification.title,
            notification.message,
            notification.task_id
        )?;
        out.flush()?;
        Ok(())
    }

    fn dismiss(&self, task_id: TaskId) -> Result<()> {
        self.tray.dismiss(task_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchCommand {
    Done(TaskId),
    Help,
}

impl FromStr for WatchCommand {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut words = value.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("done"), Some(id), None) => id
                .parse()
                .map(WatchCommand::Done)
                .map_err(|_| anyhow!("'{}' is not a task id", id)),
            (Some("help"), None, None) => Ok(WatchCommand::Help),
            _ => Err(anyhow!("unknown command '{}'; try `done ID`", value.trim())),
        }
    }
}

/// Serve reminders on stdout until Ctrl-C or end of stdin.
pub async fn run(config: AppConfig, args: WatchArgs) -> Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    let out = Arc::new(Mutex::new(std::io::stdout()));
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    serve(config, args, input, out, shutdown).await
}

pub async fn serve<R, W, S>(
    config: AppConfig,
    args: WatchArgs,
    input: R,
    out: Arc<Mutex<W>>,
    shutdown: S,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
    S: Future<Output = ()>,
{
    let notifier = Arc::new(ConsoleNotifier::new(out.clone()));
    let (app, alarms) = App::open(config, notifier)?;
    let home = app.home();
    let dispatcher = app.dispatcher();

    let scheduled = home.reschedule_pending(Utc::now()).await?;
    tracing::info!(
        scheduled,
        data_dir = %app.config().data_dir().display(),
        "watching for reminders"
    );
    say(&out, format_args!("Watching {} task(s); Ctrl-C to stop", scheduled))?;

    let runner = tokio::spawn(dispatcher.clone().run(alarms));
    let mut lines = input.lines();
    let mut resync = tokio::time::interval(Duration::from_secs(args.resync_secs));
    resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    resync.tick().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = resync.tick() => {
                if let Err(err) = home.reschedule_pending(Utc::now()).await {
                    tracing::warn!(error = %err, "failed to resync reminders");
                }
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => handle_line(&dispatcher, &line, &out).await?,
                None => break,
            },
        }
    }

    runner.abort();
    tracing::info!(pending = app.pending_alarms(), "watch stopped");
    Ok(())
}

async fn handle_line<W: Write>(
    dispatcher: &NotificationDispatcher,
    line: &str,
    out: &Mutex<W>,
) -> Result<()> {
    match line.parse::<WatchCommand>() {
        Ok(WatchCommand::Done(id)) => {
            if dispatcher.mark_complete(id).await? {
                say(out, format_args!("Completed task {}", id))
            } else {
                say(out, format_args!("Task {} not found", id))
            }
        }
        Ok(WatchCommand::Help) => say(out, format_args!("Commands: done ID")),
        Err(err) => say(out, format_args!("{}", err)),
    }
}

fn say<W: Write>(out: &Mutex<W>, message: std::fmt::Arguments<'_>) -> Result<()> {
    let mut out = out.lock();
    writeln!(out, "{}", message)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NotificationKind, Task, TaskRepository};
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn output(out: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(out.lock().clone()).expect("utf8")
    }

    #[rstest]
    #[case("done 4", Some(WatchCommand::Done(4)))]
    #[case("  done   12 ", Some(WatchCommand::Done(12)))]
    #[case("help", Some(WatchCommand::Help))]
    #[case("done", None)]
    #[case("done x", None)]
    #[case("done 1 2", None)]
    #[case("snooze 3", None)]
    fn parses_watch_commands(#[case] line: &str, #[case] expected: Option<WatchCommand>) {
        assert_eq!(line.parse::<WatchCommand>().ok(), expected);
    }

    #[test]
    fn console_notifier_prints_and_tracks() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let notifier = ConsoleNotifier::new(out.clone());
        let task = Task::new("Buy milk", "", Utc::now()).with_id(3);
        notifier
            .notify(&Notification::for_task(3, &task, NotificationKind::DueNow))
            .unwrap();

        assert_eq!(
            output(&out),
            "[due now] #3 Buy milk: Due now (type `done 3` to mark complete)\n"
        );
        assert_eq!(notifier.active().len(), 1);
        notifier.dismiss(3).unwrap();
        assert!(notifier.active().is_empty());
    }

    #[tokio::test]
    async fn done_line_completes_task_and_input_end_stops() {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
        let id = {
            let repository = TaskRepository::open(&config).expect("repository");
            repository
                .insert_task(Task::new("Stretch", "", Utc::now() + ChronoDuration::hours(1)))
                .await
                .unwrap()
                .id
                .unwrap()
        };

        let script = format!("done {}\ndone 999\nwhat\n", id);
        let input = BufReader::new(script.as_bytes());
        let out = Arc::new(Mutex::new(Vec::new()));
        serve(
            config.clone(),
            WatchArgs { resync_secs: 30 },
            input,
            out.clone(),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        let printed = output(&out);
        assert!(printed.starts_with("Watching 1 task(s)"));
        assert!(printed.contains(&format!("Completed task {}", id)));
        assert!(printed.contains("Task 999 not found"));
        assert!(printed.contains("unknown command 'what'"));

        let repository = TaskRepository::open(&config).expect("repository");
        assert!(repository.task_by_id(id).await.unwrap().unwrap().completed);
    }

    #[tokio::test(start_paused = true)]
    async fn resyncs_print_each_reminder_once_until_shutdown() {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
        {
            let repository = TaskRepository::open(&config).expect("repository");
            repository
                .insert_task(Task::new("Stand-up", "", Utc::now() + ChronoDuration::minutes(5)))
                .await
                .unwrap();
        }

        // Input that never ends, so only the shutdown future can stop the loop.
        let (_keyboard, input) = tokio::io::duplex(64);
        let out = Arc::new(Mutex::new(Vec::new()));
        serve(
            config,
            WatchArgs { resync_secs: 30 },
            BufReader::new(input),
            out.clone(),
            tokio::time::sleep(Duration::from_secs(400)),
        )
        .await
        .unwrap();

        let printed = output(&out);
        let count = |tag: &str| printed.lines().filter(|line| line.starts_with(tag)).count();
        assert!(printed.starts_with("Watching 1 task(s)"));
        assert_eq!(count("[upcoming] "), 1);
        assert_eq!(count("[due now] "), 1);
    }
}
