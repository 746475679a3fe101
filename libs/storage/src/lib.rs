//! # Storage
//!
//! Persistence layers of the TA pipeline:
//!
//! - [`OrderedStore`]: backend seam with upsert-by-score, ordered range
//!   queries, range deletes and atomic pipelines. [`MemoryStore`] is the
//!   in-process backend.
//! - [`TimeseriesStorage`]: `(partition, storage class, index)` series with
//!   bucket alignment checked before any write.
//! - [`IndicatorStorage`]: 5-minute indicator series that notify the bus on save.
//! - [`SignalRepository`]: event/signal rows, unique per rule firing.
//!
//! Every component receives its store handle explicitly; nothing here is global.

pub mod backend;
pub mod error;
pub mod indicator;
pub mod memory;
pub mod repository;
pub mod timeseries;

pub use backend::{Order, OrderedStore, Pipeline, ScoreRange, WriteOp};
pub use error::{PersistenceError, StoreError, StoreResult};
pub use indicator::{IndicatorEntry, IndicatorStorage, SeriesValue};
pub use memory::MemoryStore;
pub use repository::{MemorySignalRepository, SignalRepository};
pub use timeseries::{SeriesEntry, TimeseriesStorage};
