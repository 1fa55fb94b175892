//! Background worker binary.
//!
//! Reads protocol requests as newline-delimited JSON from stdin and answers
//! on stdout, where notification events are also written. Pending alarms and
//! todo state persist under the data directory between runs.
//!
//! All diagnostic output goes to stderr so that stdout remains a clean JSON
//! protocol channel.
//!
//! Usage: `easy-todo-worker [CONFIG_PATH]`

use easy_todo::background::{BackgroundWorker, WorkerChannels, WorkerSettings};
use easy_todo::clock::{SharedClock, SystemClock};
use easy_todo::config::{AppConfig, LoggingConfig};
use easy_todo::host::message_channel;
use easy_todo::host::stdio::run_stdio_bridge;
use easy_todo::notification::{HostEventBackend, NotificationPresenter};
use easy_todo::reminder::AlarmRegistry;
use easy_todo::storage::{FileStore, StorageService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const REQUEST_CAPACITY: usize = 64;
const ALARM_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_config_path);
    let config = AppConfig::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", config_path.display()))?;

    let _log_guard = init_tracing(&config.logging);
    tracing::info!("easy-todo-worker starting (config: {})", config_path.display());

    let clock: SharedClock = Arc::new(SystemClock);
    let storage = StorageService::new(
        Arc::new(FileStore::new(config.storage.state_path())),
        Arc::clone(&clock),
    );
    let alarms = Arc::new(AlarmRegistry::open(config.storage.alarm_path()).await?);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let presenter = NotificationPresenter::new(vec![Arc::new(HostEventBackend::new(event_tx))])
        .with_reminder_interaction(config.notifications.reminder_requires_interaction);

    let (client, requests) = message_channel(REQUEST_CAPACITY, config.reminders.message_timeout());
    let (alarm_tx, alarm_rx) = mpsc::channel(ALARM_CAPACITY);
    let cancel = CancellationToken::new();

    let runner = alarms.spawn_runner(Arc::clone(&clock), alarm_tx, cancel.clone());
    let worker = BackgroundWorker::new(
        storage.clone(),
        alarms,
        presenter,
        WorkerSettings::from_config(&config),
    )
    .spawn(
        WorkerChannels {
            requests,
            alarms: alarm_rx,
            changes: storage.subscribe(),
        },
        cancel.clone(),
    );

    let result = tokio::select! {
        result = run_stdio_bridge(client, event_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received; shutting down");
            Ok(())
        }
    };

    cancel.cancel();
    let _ = runner.await;
    let _ = worker.await;

    result.map_err(|e| {
        tracing::error!(error = %e, "easy-todo-worker exited with error");
        anyhow::anyhow!("easy-todo-worker failed: {e}")
    })?;
    tracing::info!("easy-todo-worker shut down cleanly");
    Ok(())
}

/// Stderr logging, plus daily-rotated files when enabled.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if logging.log_to_file {
        let appender =
            tracing_appender::rolling::daily(easy_todo::app_dirs::logs_dir(), "easy-todo.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}
