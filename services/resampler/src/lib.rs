//! # Resampler
//!
//! Turns raw collector ticks into authoritative 5-minute OHLCV buckets.
//!
//! - [`PriceVolumeHistory`]: raw tick series, one score per second
//! - [`Resampler`]: per-bucket two-phase resample, multi-partition sweeps
//! - [`HistoryResampleSubscriber`]: resamples as soon as a close lands
//! - [`RestoreJob`]: day-by-day backfill from a [`PriceHistorySource`]
//!
//! ```text
//! raw ticks ──► PriceVolumeHistoryStorage ──► Resampler ──► PriceStorage / VolumeStorage
//!                                                  │
//!                                                  └─► raw range deleted after commit
//! ```

pub mod bucket;
pub mod error;
pub mod history;
pub mod resampler;
pub mod restore;
pub mod subscriber;

pub use bucket::{BucketState, RawBucket};
pub use error::ResampleError;
pub use history::PriceVolumeHistory;
pub use resampler::{end_score_for, ResampleOutcome, Resampler, SweepReport};
pub use restore::{PriceHistoryRow, PriceHistorySource, RestoreJob, RestoreReport};
pub use subscriber::HistoryResampleSubscriber;
