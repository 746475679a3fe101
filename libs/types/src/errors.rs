//! Error types for bucket validation and type parsing

use thiserror::Error;

/// A timestamp that does not sit on a bucket boundary.
///
/// Always surfaced to the caller before any write is attempted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("timestamp {timestamp} is not aligned to a {bucket_width}s bucket")]
pub struct AlignmentError {
    pub timestamp: i64,
    pub bucket_width: i64,
}

/// Errors raised while parsing or constructing domain types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("unknown storage class: {0}")]
    UnknownStorageClass(String),

    #[error("unknown price index: {0}")]
    UnknownIndex(String),

    #[error("invalid partition key '{input}': {reason}")]
    InvalidPartition { input: String, reason: String },

    #[error("invalid series coordinates: {0}")]
    InvalidCoordinates(String),
}
