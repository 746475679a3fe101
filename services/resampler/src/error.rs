use pubsub::BusError;
use storage::StoreError;
use thiserror::Error;
use types::AlignmentError;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to publish resample notification: {0}")]
    Notify(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, ResampleError>;
