//! # TA Pipeline Types
//!
//! Domain types shared by every crate in the pipeline.
//!
//! ## Design Philosophy
//!
//! - **Partition First**: every series is sharded by `(ticker, exchange)`; nothing
//!   in this crate orders values across partitions
//! - **Aligned Buckets**: bucket-aligned timestamps are validated at construction,
//!   never silently rounded
//! - **Typed Coordinates**: series keys and bus payloads are built from explicit
//!   structs that reject unknown fields
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{PartitionKey, SeriesKey, SeriesKind, score_from_timestamp, FIVE_MINUTES};
//!
//! let partition = PartitionKey::new("ETH_BTC", "BITTREX");
//! let key = SeriesKey::new(partition, SeriesKind::Price, "close_price");
//! assert_eq!(key.to_string(), "ETH_BTC:BITTREX:PriceStorage:close_price");
//! assert_eq!(score_from_timestamp(1_483_228_800, FIVE_MINUTES), 4_944_096);
//! ```

pub mod bucket;
pub mod errors;
pub mod market;
pub mod partition;
pub mod records;
pub mod report;
pub mod series;

pub use bucket::{
    align_down, ensure_aligned, is_aligned, nearest_5min_timestamp, score_from_timestamp, timestamp_from_score,
    timestamp_is_near_5min, Horizon, DAY, FIVE_MINUTES, HOUR,
};
pub use errors::{AlignmentError, TypesError};
pub use market::{Ohlcv, PriceIndex, PriceTick};
pub use partition::PartitionKey;
pub use records::{Event, RuleKey, Signal, Trend};
pub use report::BatchReport;
pub use series::{SeriesCoordinates, SeriesKey, SeriesKind};
