//! Pipeline error types

use thiserror::Error;

/// Why a payload failed to become a stored row.
///
/// `TooEarlyForAssociation` is a sentinel, not a fault: parent inserts and
/// child inserts race across independent queues, and children arriving
/// inside the early-frame grace window are dropped silently.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payload field {index} missing for {kind}")]
    MissingField { kind: &'static str, index: usize },

    #[error("parent not committed yet (grace window)")]
    TooEarlyForAssociation,

    #[error("no {parent} with ocap id {ocap_id} in mission {mission_id}")]
    MissingAssociation {
        parent: &'static str,
        ocap_id: u16,
        mission_id: i64,
    },

    #[error("no mission loaded")]
    NoMission,

    #[error(transparent)]
    Storage(#[from] ocap_persistence::PersistenceError),
}

impl From<ocap_domain::DomainError> for PipelineError {
    fn from(err: ocap_domain::DomainError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
