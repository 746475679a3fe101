use proptest::prelude::*;
use types::{score_from_timestamp, timestamp_from_score, DAY, FIVE_MINUTES};

proptest! {
    #[test]
    fn bucket_start_contains_timestamp(ts in 0i64..4_000_000_000) {
        for width in [1, FIVE_MINUTES, DAY] {
            let start = timestamp_from_score(score_from_timestamp(ts, width), width);
            prop_assert!(start <= ts && ts < start + width);
            prop_assert_eq!(start % width, 0);
        }
    }

    #[test]
    fn scores_are_monotonic(a in 0i64..4_000_000_000, b in 0i64..4_000_000_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(score_from_timestamp(lo, FIVE_MINUTES) <= score_from_timestamp(hi, FIVE_MINUTES));
    }
}
