//! Persistence layer error types

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
