//! # Ingest Pipeline
//!
//! Host call → router → per-kind channel → processor → per-kind queue →
//! batched writer → storage. The status monitor samples depths from the
//! router and queues; the lifecycle controller owns startup and shutdown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

pub mod cache;
pub mod context;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod monitor;
pub mod parse;
pub mod processors;
pub mod queues;
pub mod router;
pub mod writer;

pub use cache::AssociationCache;
pub use context::{CurrentMission, MissionContext};
pub use error::{PipelineError, Result};
pub use host::{HostCallback, LogCallback, SharedCallback};
pub use lifecycle::{Controller, ControllerConfig};
pub use queues::{WriteQueue, WriteQueues};
pub use router::{build, ChannelCapacities, EventKind, Payload, Receivers, Router};

/// Children whose parent lookup fails inside this many capture frames are
/// dropped silently: their parent insert is still in flight on another
/// queue.
pub const EARLY_ASSOCIATION_FRAMES: u32 = 10;

/// Process-wide pipeline flags, shared by every long-running task.
///
/// `storage_valid` starts false and is set once the lifecycle controller has
/// a migrated store; flipping it back to false makes every task exit at its
/// next loop head. `insert_paused` is held by the snapshot routine to reach
/// quiescence.
#[derive(Debug)]
pub struct Flags {
    storage_valid: AtomicBool,
    insert_paused: AtomicBool,
    last_write_ns: AtomicU64,
}

impl Flags {
    pub fn new() -> Self {
        Self {
            storage_valid: AtomicBool::new(false),
            insert_paused: AtomicBool::new(false),
            last_write_ns: AtomicU64::new(0),
        }
    }

    pub fn storage_valid(&self) -> bool {
        self.storage_valid.load(Ordering::Relaxed)
    }

    pub fn set_storage_valid(&self, valid: bool) {
        self.storage_valid.store(valid, Ordering::Relaxed);
    }

    pub fn insert_paused(&self) -> bool {
        self.insert_paused.load(Ordering::Relaxed)
    }

    pub fn set_insert_paused(&self, paused: bool) {
        self.insert_paused.store(paused, Ordering::Relaxed);
    }

    pub fn last_write(&self) -> Duration {
        Duration::from_nanos(self.last_write_ns.load(Ordering::Relaxed))
    }

    pub fn set_last_write(&self, duration: Duration) {
        self.last_write_ns
            .store(duration.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}
