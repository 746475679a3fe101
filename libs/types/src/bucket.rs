//! Bucket and score arithmetic
//!
//! A score is the ordinal of a fixed-width bucket: `score = floor(timestamp / width)`.
//! Scores are the sort key of every ordered series, which keeps range queries
//! and range deletes independent of wall-clock formatting.

use crate::errors::AlignmentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base resample width of every indicator series
pub const FIVE_MINUTES: i64 = 300;
pub const HOUR: i64 = 3_600;
pub const DAY: i64 = 86_400;

/// Tolerance around a 5-minute mark used when snapping collector timestamps
const NEAR_5MIN_TOLERANCE: i64 = 45;

/// Monotonic bucket ordinal for `timestamp`.
pub fn score_from_timestamp(timestamp: i64, bucket_width: i64) -> i64 {
    timestamp.div_euclid(bucket_width)
}

/// Start timestamp of the bucket with ordinal `score`.
pub fn timestamp_from_score(score: i64, bucket_width: i64) -> i64 {
    score * bucket_width
}

pub fn is_aligned(timestamp: i64, bucket_width: i64) -> bool {
    timestamp.rem_euclid(bucket_width) == 0
}

/// Round `timestamp` down to the start of its bucket.
pub fn align_down(timestamp: i64, bucket_width: i64) -> i64 {
    timestamp - timestamp.rem_euclid(bucket_width)
}

/// Reject `timestamp` unless it sits on a `bucket_width` boundary.
pub fn ensure_aligned(timestamp: i64, bucket_width: i64) -> Result<(), AlignmentError> {
    if is_aligned(timestamp, bucket_width) {
        Ok(())
    } else {
        Err(AlignmentError {
            timestamp,
            bucket_width,
        })
    }
}

/// True when `timestamp` is within 45 seconds of a 5-minute mark.
pub fn timestamp_is_near_5min(timestamp: i64) -> bool {
    (timestamp + NEAR_5MIN_TOLERANCE).rem_euclid(FIVE_MINUTES) < 2 * NEAR_5MIN_TOLERANCE
}

/// Snap to the 5-minute mark at or before `timestamp + 45s`.
pub fn nearest_5min_timestamp(timestamp: i64) -> i64 {
    align_down(timestamp + NEAR_5MIN_TOLERANCE, FIVE_MINUTES)
}

/// Multiplier on the 5-minute base width.
///
/// `Horizon(25)` views the same indicator family over 25 base buckets. Every
/// horizon is stored as its own sub-series (`{family}_{periods}`) inside the
/// family's storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Horizon(pub u32);

impl Horizon {
    pub fn periods(&self) -> usize {
        self.0 as usize
    }

    pub fn bucket_width(&self) -> i64 {
        FIVE_MINUTES * i64::from(self.0)
    }

    /// Sub-series index name for an indicator family at this horizon
    pub fn index(&self, family: &str) -> String {
        format!("{}_{}", family, self.0)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} periods", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_score_matches_integer_division() {
        assert_eq!(score_from_timestamp(1000, FIVE_MINUTES), 3);
        assert_eq!(timestamp_from_score(3, FIVE_MINUTES), 900);
        assert_eq!(align_down(1000, FIVE_MINUTES), 900);
    }

    #[test]
    fn test_ensure_aligned() {
        assert!(ensure_aligned(900, FIVE_MINUTES).is_ok());
        let err = ensure_aligned(1000, FIVE_MINUTES).unwrap_err();
        assert_eq!(err.timestamp, 1000);
        assert_eq!(err.bucket_width, 300);
    }

    #[test]
    fn test_near_5min_helpers() {
        assert!(timestamp_is_near_5min(1_483_228_800 + 44));
        assert!(timestamp_is_near_5min(1_483_228_800 - 45));
        assert!(!timestamp_is_near_5min(1_483_228_800 + 46));
        assert_eq!(nearest_5min_timestamp(1_483_228_800 + 40), 1_483_228_800);
        assert_eq!(nearest_5min_timestamp(1_483_228_800 - 40), 1_483_228_800);
        assert_eq!(nearest_5min_timestamp(1_483_228_800 + 200), 1_483_228_800);
        assert_eq!(nearest_5min_timestamp(1_483_228_800 + 260), 1_483_229_100);
    }

    #[test]
    fn test_horizon_index_and_width() {
        let horizon = Horizon(25);
        assert_eq!(horizon.index("bbands"), "bbands_25");
        assert_eq!(horizon.bucket_width(), 7_500);
    }

    proptest! {
        #[test]
        fn prop_aligned_timestamps_round_trip(bucket in -10_000_000i64..10_000_000i64) {
            let timestamp = bucket * FIVE_MINUTES;
            prop_assert_eq!(
                timestamp_from_score(score_from_timestamp(timestamp, FIVE_MINUTES), FIVE_MINUTES),
                timestamp
            );
        }

        #[test]
        fn prop_unaligned_timestamps_rejected(bucket in 0i64..10_000_000i64, offset in 1i64..300) {
            let timestamp = bucket * FIVE_MINUTES + offset;
            prop_assert!(ensure_aligned(timestamp, FIVE_MINUTES).is_err());
        }
    }
}
