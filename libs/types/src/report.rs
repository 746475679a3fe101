//! Outcome counters for batch entry points
//!
//! Batch jobs report how many items were processed, skipped and failed
//! instead of aborting on the first error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items that produced output
    pub processed: u64,
    /// Items with nothing to do yet (missing data, pending buckets)
    pub skipped: u64,
    /// Items that hit a store, bus or handler fault
    pub failed: u64,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    /// Share of items that did not fail, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 100.0;
        }
        ((total - self.failed) as f64 / total as f64) * 100.0
    }
}

impl AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} skipped={} failed={}",
            self.processed, self.skipped, self.failed
        )
    }
}
