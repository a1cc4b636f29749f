//! Log sink setup: console, a rotating primary log file, and a per-session
//! JSONL file.

use chrono::Utc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Keeps the non-blocking writers flushing; hold until process exit.
pub struct LogGuards {
    _primary: WorkerGuard,
    _jsonl: WorkerGuard,
}

pub fn init(config: &Config) -> anyhow::Result<LogGuards> {
    std::fs::create_dir_all(&config.logs_dir)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let primary = tracing_appender::rolling::daily(&config.logs_dir, "ocap_recorder.log");
    let (primary_writer, primary_guard) = tracing_appender::non_blocking(primary);

    let session = Utc::now().format("%Y%m%d_%H%M%S");
    let jsonl =
        tracing_appender::rolling::never(&config.logs_dir, format!("ocap_{session}.jsonl"));
    let (jsonl_writer, jsonl_guard) = tracing_appender::non_blocking(jsonl);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(primary_writer),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(jsonl_writer),
        )
        .init();

    Ok(LogGuards {
        _primary: primary_guard,
        _jsonl: jsonl_guard,
    })
}
