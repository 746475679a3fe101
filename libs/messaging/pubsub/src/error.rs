//! Bus and dispatch errors

use thiserror::Error;
use types::TypesError;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to encode notification: {0}")]
    Encode(#[from] TypesError),

    #[error("channel {0} is not a storage class")]
    UnknownChannel(String),
}

/// A handler failed while processing a well-formed message.
///
/// Returned to whoever drives the dispatch loop with the subscriber and
/// channel attached; the loop itself keeps polling.
#[derive(Debug, Error)]
#[error("subscriber {subscriber} failed handling {channel} message: {source}")]
pub struct SubscriberFault {
    pub subscriber: String,
    pub channel: String,
    pub payload: String,
    #[source]
    pub source: anyhow::Error,
}
