use storage::StoreError;
use thiserror::Error;
use types::AlignmentError;

#[derive(Debug, Error)]
pub enum IndicatorError {
    /// Not enough upstream history for the window; the horizon is skipped
    #[error("insufficient data: needed {needed} points, found {available}")]
    MissingData { needed: usize, available: usize },

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IndicatorError {
    pub fn is_missing_data(&self) -> bool {
        matches!(self, IndicatorError::MissingData { .. })
    }
}
