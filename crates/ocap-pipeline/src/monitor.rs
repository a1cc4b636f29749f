//! # Status Monitor
//!
//! Samples channel and queue depths once a second, rewrites a plain-text
//! status file, and offers every snapshot to an optional metrics sink.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{trace, warn};

use crate::queues::WriteQueues;
use crate::router::Router;
use crate::Flags;

/// Sampling cadence.
pub const STATUS_TICK: Duration = Duration::from_secs(1);

/// One sampled status point.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub channels: Vec<(&'static str, usize)>,
    pub queues: Vec<(&'static str, usize)>,
    pub last_write: Duration,
    pub dropped: u64,
}

/// Optional per-snapshot metrics consumer. Concrete remote sinks live with
/// the host integration; the default just keeps a trace trail.
pub trait MetricsSink: Send + Sync {
    fn record(&self, snapshot: &StatusSnapshot);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, snapshot: &StatusSnapshot) {
        trace!(
            queued = snapshot.queues.iter().map(|(_, n)| n).sum::<usize>(),
            dropped = snapshot.dropped,
            "status point"
        );
    }
}

/// Render the three-line status file body.
pub fn format_status(snapshot: &StatusSnapshot) -> String {
    let channels = snapshot
        .channels
        .iter()
        .map(|(name, depth)| format!("{name}={depth}"))
        .collect::<Vec<_>>()
        .join(" ");
    let queues = snapshot
        .queues
        .iter()
        .map(|(name, depth)| format!("{name}={depth}"))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "channels: {channels}\nqueues: {queues}\nlast_write: {:.3}ms\n",
        snapshot.last_write.as_secs_f64() * 1000.0
    )
}

/// Run until storage goes invalid.
pub async fn run_monitor(
    router: Router,
    queues: Arc<WriteQueues>,
    flags: Arc<Flags>,
    status_path: PathBuf,
    sink: Arc<dyn MetricsSink>,
    tick: Duration,
) {
    loop {
        if !flags.storage_valid() {
            return;
        }

        let snapshot = StatusSnapshot {
            channels: router.depths(),
            queues: queues.depths(),
            last_write: flags.last_write(),
            dropped: router.dropped(),
        };

        if let Err(e) = tokio::fs::write(&status_path, format_status(&snapshot)).await {
            warn!(path = %status_path.display(), error = %e, "status file write failed");
        }
        sink.record(&snapshot);

        sleep(tick).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_status_three_lines() {
        let snapshot = StatusSnapshot {
            channels: vec![("soldiers", 3), ("fired", 0)],
            queues: vec![("soldiers", 12)],
            last_write: Duration::from_micros(12_345),
            dropped: 0,
        };
        let body = format_status(&snapshot);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "channels: soldiers=3 fired=0");
        assert_eq!(lines[1], "queues: soldiers=12");
        assert_eq!(lines[2], "last_write: 12.345ms");
    }
}
