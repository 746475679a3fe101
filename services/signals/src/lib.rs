//! # Signals
//!
//! Evaluates the rule table over indicator snapshots and records what fires.
//!
//! - [`SnapshotReader`]: current, previous and long-period values for a bucket
//! - [`ElementaryEvents`]: single-indicator conditions (band crosses, SMA
//!   trend, RSI bracket, VBI crosses)
//! - [`Rule`]: elementary and logical rules, some spanning two horizons
//! - [`Detector`]: idempotent evaluation per `(partition, bucket, rule)`;
//!   also a bus subscriber on every indicator channel

pub mod detector;
pub mod elementary;
pub mod error;
pub mod rules;
pub mod snapshot;

pub use detector::{DetectionPass, Detector, RuleOutcome, RuleState};
pub use elementary::{ElementaryEvents, LongEvents};
pub use error::DetectorError;
pub use rules::{Evaluation, Firing, Rule};
pub use snapshot::{LongSnapshot, Snapshot, SnapshotReader};
