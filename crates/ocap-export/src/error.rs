//! Export error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("mission {0} not found")]
    MissionNotFound(i64),

    #[error(transparent)]
    Storage(#[from] ocap_persistence::PersistenceError),

    #[error("artifact write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
