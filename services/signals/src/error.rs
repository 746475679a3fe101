use storage::StoreError;
use thiserror::Error;
use types::AlignmentError;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    /// Snapshot could not be read
    #[error("snapshot read failed: {0}")]
    Store(#[from] StoreError),
}
