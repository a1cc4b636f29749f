//! # Storage Backend
//!
//! Typed persistence for every recorder entity behind one port
//! ([`Storage`]), with two interchangeable drivers: a server-class Postgres
//! driver (primary) and an embedded SQLite driver (fallback). Driver
//! selection happens once at startup; a process-wide flag records when the
//! fallback is in use so the lifecycle controller knows to run the snapshot
//! task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;

pub mod error;
pub mod records;
pub mod repository;

pub use error::{PersistenceError, Result};
pub use records::*;
pub use repository::{
    Driver, EntityRepository, EventRepository, ExportRepository, MaintenanceRepository,
    MissionRepository, PostgresStorage, SqliteStorage, Storage, TimelineRepository,
};

/// Set when the primary driver was unreachable and the embedded fallback was
/// promoted.
static USING_LOCAL: AtomicBool = AtomicBool::new(false);

/// Whether the process is running on the embedded fallback store.
pub fn using_local() -> bool {
    USING_LOCAL.load(Ordering::Relaxed)
}

/// Primary database connection settings (`db` section of the config file).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            username: "ocap".to_string(),
            password: String::new(),
            database: "ocap".to_string(),
        }
    }
}

/// A connected storage backend. Holds the concrete driver so
/// dialect-specific operations (the SQLite snapshot) stay reachable from the
/// lifecycle controller without leaking into the port.
#[derive(Clone)]
pub enum Backend {
    Postgres(PostgresStorage),
    Sqlite(SqliteStorage),
}

impl Backend {
    /// The port handle shared with the pipeline, exporter, and reducer.
    pub fn storage(&self) -> Arc<dyn Storage> {
        match self {
            Self::Postgres(pg) => Arc::new(pg.clone()),
            Self::Sqlite(lite) => Arc::new(lite.clone()),
        }
    }

    pub fn driver(&self) -> Driver {
        match self {
            Self::Postgres(_) => Driver::Postgres,
            Self::Sqlite(_) => Driver::Sqlite,
        }
    }

    /// The embedded driver, when the fallback was promoted.
    pub fn as_sqlite(&self) -> Option<&SqliteStorage> {
        match self {
            Self::Postgres(_) => None,
            Self::Sqlite(lite) => Some(lite),
        }
    }
}

/// Connect to storage: primary first, embedded fallback on any connect or
/// ping failure.
pub async fn connect(config: &DbConfig) -> Result<Backend> {
    match PostgresStorage::connect(config).await {
        Ok(pg) => match pg.ping().await {
            Ok(()) => {
                tracing::info!(
                    host = %config.host,
                    port = config.port,
                    database = %config.database,
                    "connected to postgres"
                );
                return Ok(Backend::Postgres(pg));
            }
            Err(e) => {
                tracing::warn!(error = %e, "postgres ping failed, promoting embedded fallback");
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "postgres connect failed, promoting embedded fallback");
        }
    }

    let lite = SqliteStorage::connect_in_memory().await?;
    USING_LOCAL.store(true, Ordering::Relaxed);
    tracing::info!("embedded in-memory store ready");
    Ok(Backend::Sqlite(lite))
}
