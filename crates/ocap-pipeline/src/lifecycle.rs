//! # Lifecycle Controller
//!
//! Brings the pipeline up once the host signals `:INIT:DB:`: open storage,
//! migrate the schema, seed group info, start processors, writer, snapshot
//! task (embedded driver only) and status monitor, then answer the host
//! with `:DB:OK:`. Shutdown flushes the writer once and flips the
//! storage-valid flag so every task exits at its next loop head.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::cache::AssociationCache;
use crate::context::MissionContext;
use crate::host::{payload_array, SharedCallback, CB_DB_ERROR, CB_DB_OK, CB_VERSION};
use crate::monitor::{self, MetricsSink, NoopSink};
use crate::processors::{self, ProcessorCtx};
use crate::queues::WriteQueues;
use crate::router::{Receivers, Router};
use crate::writer::{self, WRITE_TICK};
use crate::Flags;
use ocap_persistence::{DbConfig, MaintenanceRepository, SqliteStorage, Storage};

/// Interval between embedded-store disk snapshots.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(180);

/// Controller settings, derived from the loaded configuration by the
/// binary.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub db: DbConfig,
    /// Directory holding snapshots and the status file
    pub install_dir: PathBuf,
    pub snapshot_interval: Duration,
    pub status_path: PathBuf,
    /// Tag stamped on missions whose payload carries none
    pub default_tag: String,
}

impl ControllerConfig {
    pub fn new(db: DbConfig, install_dir: PathBuf) -> Self {
        let status_path = install_dir.join("ocap_status.txt");
        Self {
            db,
            install_dir,
            snapshot_interval: SNAPSHOT_INTERVAL,
            status_path,
            default_tag: "Op".to_string(),
        }
    }
}

/// Owns the shared pipeline state and orchestrates startup and shutdown.
pub struct Controller {
    pub context: Arc<MissionContext>,
    pub queues: Arc<WriteQueues>,
    pub cache: Arc<AssociationCache>,
    pub flags: Arc<Flags>,
    config: ControllerConfig,
    callback: SharedCallback,
    metrics: Arc<dyn MetricsSink>,
    storage: Mutex<Option<Arc<dyn Storage>>>,
}

impl Controller {
    pub fn new(config: ControllerConfig, callback: SharedCallback) -> Self {
        Self {
            context: Arc::new(MissionContext::new()),
            queues: Arc::new(WriteQueues::new()),
            cache: Arc::new(AssociationCache::new()),
            flags: Arc::new(Flags::new()),
            config,
            callback,
            metrics: Arc::new(NoopSink),
            storage: Mutex::new(None),
        }
    }

    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// The storage handle, once startup has completed.
    pub fn storage(&self) -> Option<Arc<dyn Storage>> {
        self.storage
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Wait for the host init signal, then bring everything up. Returns
    /// after startup; the spawned tasks keep running.
    pub async fn run(&self, mut receivers: Receivers, router: Router) {
        if receivers.init.recv().await.is_none() {
            warn!("router dropped before :INIT:DB:");
            return;
        }
        self.start(receivers, router).await;
    }

    /// Ordered startup. Public so CLI verbs that skip the host handshake
    /// (the demo generator) can start the pipeline directly.
    pub async fn start(&self, receivers: Receivers, router: Router) {
        let backend = match ocap_persistence::connect(&self.config.db).await {
            Ok(backend) => backend,
            Err(e) => {
                error!(error = %e, "storage unavailable, pipeline not started");
                self.flags.set_storage_valid(false);
                let reason = e.to_string();
                self.callback
                    .callback(CB_DB_ERROR, &payload_array(&[reason.as_str()]));
                return;
            }
        };

        let storage = backend.storage();
        if let Err(e) = storage.migrate().await {
            error!(error = %e, "schema migration failed, pipeline not started");
            self.flags.set_storage_valid(false);
            let reason = e.to_string();
            self.callback
                .callback(CB_DB_ERROR, &payload_array(&[reason.as_str()]));
            return;
        }
        if let Err(e) = storage.seed_group_info().await {
            warn!(error = %e, "group info seed failed");
        }

        *self.storage.lock().unwrap_or_else(|p| p.into_inner()) = Some(storage.clone());
        self.flags.set_storage_valid(true);

        let ctx = ProcessorCtx {
            storage: storage.clone(),
            queues: self.queues.clone(),
            cache: self.cache.clone(),
            context: self.context.clone(),
            flags: self.flags.clone(),
            callback: self.callback.clone(),
            default_tag: self.config.default_tag.clone(),
        };
        processors::spawn_processors(receivers, &ctx);

        tokio::spawn(writer::run_writer(
            storage.clone(),
            self.queues.clone(),
            self.cache.clone(),
            self.flags.clone(),
            WRITE_TICK,
        ));

        if let Some(lite) = backend.as_sqlite() {
            tokio::spawn(run_snapshots(
                lite.clone(),
                self.flags.clone(),
                self.config.install_dir.clone(),
                self.config.snapshot_interval,
            ));
        }

        tokio::spawn(monitor::run_monitor(
            router,
            self.queues.clone(),
            self.flags.clone(),
            self.config.status_path.clone(),
            self.metrics.clone(),
            monitor::STATUS_TICK,
        ));

        let driver = backend.driver().as_str();
        info!(driver, "pipeline started");
        self.callback.callback(CB_DB_OK, &payload_array(&[driver]));
        self.callback.callback(
            CB_VERSION,
            &payload_array(&[env!("CARGO_PKG_VERSION")]),
        );
    }

    /// Ordered shutdown: one final flush with every queue, then invalidate
    /// storage so all tasks stop.
    pub async fn shutdown(&self) {
        let storage = self.storage();
        if let Some(storage) = storage {
            writer::flush_once(storage.as_ref(), &self.queues, &self.cache).await;
        }
        self.flags.set_storage_valid(false);
        info!("pipeline stopped");
    }
}

/// Embedded-driver snapshot task: every interval, pause ingest and dump the
/// in-memory database to a file named by session start.
async fn run_snapshots(
    lite: SqliteStorage,
    flags: Arc<Flags>,
    install_dir: PathBuf,
    interval: Duration,
) {
    let session_start = Utc::now().format("%Y%m%d_%H%M%S");
    let path = install_dir.join(format!("ocap_{session_start}.db"));

    loop {
        tokio::time::sleep(interval).await;
        if !flags.storage_valid() {
            return;
        }

        flags.set_insert_paused(true);
        match lite.snapshot_into(&path).await {
            Ok(()) => info!(path = %path.display(), "snapshot written"),
            // Leave whatever snapshot is already on disk
            Err(e) => error!(error = %e, "snapshot failed"),
        }
        flags.set_insert_paused(false);
    }
}
