use pubsub::BusError;
use thiserror::Error;
use types::{AlignmentError, RuleKey, TypesError};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Rejected before any I/O
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed entry in {key} at score {score}: {reason}")]
    Decode { key: String, score: i64, reason: String },

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error("failed to publish notification: {0}")]
    Notify(#[from] BusError),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Failure at the event/signal persistence boundary
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("{0} already persisted")]
    Duplicate(RuleKey),

    #[error("repository unavailable while writing {key}: {reason}")]
    Unavailable { key: RuleKey, reason: String },
}
