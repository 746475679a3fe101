//! Ordered-set backend seam
//!
//! The contract mirrors a sorted-set server: one ordered set per key, members
//! sorted by an integer score. Unlike a plain sorted set a score holds at most
//! one member; writing an existing score replaces it.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use tracing::warn;
use types::SeriesKey;

/// Inclusive score interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: i64,
    pub max: i64,
}

impl ScoreRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn single(score: i64) -> Self {
        Self::new(score, score)
    }

    pub fn all() -> Self {
        Self::new(i64::MIN, i64::MAX)
    }

    pub fn up_to(max: i64) -> Self {
        Self::new(i64::MIN, max)
    }

    pub fn contains(&self, score: i64) -> bool {
        self.min <= score && score <= self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Upsert { key: String, score: i64, member: String },
    DeleteRange { key: String, range: ScoreRange },
}

#[async_trait]
pub trait OrderedStore: Send + Sync {
    async fn upsert(&self, key: &str, score: i64, member: String) -> StoreResult<()>;

    /// Members within `range`, ordered by score, at most `limit` of them.
    /// An unknown key yields an empty result.
    async fn range(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(i64, String)>>;

    /// Returns the number of members removed
    async fn delete_range(&self, key: &str, range: ScoreRange) -> StoreResult<usize>;

    /// Apply every op or none of them.
    async fn execute(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Writes for one tick or bucket, submitted as a unit.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    ops: Vec<WriteOp>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, key: &SeriesKey, score: i64, member: String) -> &mut Self {
        self.ops.push(WriteOp::Upsert {
            key: key.to_string(),
            score,
            member,
        });
        self
    }

    pub fn delete_range(&mut self, key: &SeriesKey, range: ScoreRange) -> &mut Self {
        self.ops.push(WriteOp::DeleteRange {
            key: key.to_string(),
            range,
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Execute the whole pipeline, retrying it as a unit up to `retries`
    /// extra times while the store reports itself unavailable.
    pub async fn submit(self, store: &dyn OrderedStore, retries: u32) -> StoreResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match store.execute(self.ops.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unavailable() && attempt < retries => {
                    attempt += 1;
                    warn!(attempt, ops = self.ops.len(), error = %e, "retrying pipeline");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<Pipeline> for Vec<WriteOp> {
    fn from(pipeline: Pipeline) -> Self {
        pipeline.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_range() {
        let range = ScoreRange::new(10, 20);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
        assert!(ScoreRange::new(5, 4).is_empty());
        assert!(ScoreRange::up_to(0).contains(i64::MIN));
    }

    #[test]
    fn test_pipeline_preserves_order() {
        let key = SeriesKey::new(
            types::PartitionKey::new("ETH_BTC", "BITTREX"),
            types::SeriesKind::Price,
            "close_price",
        );
        let mut pipeline = Pipeline::new();
        pipeline
            .upsert(&key, 3, "900:11".to_string())
            .delete_range(&key, ScoreRange::single(2));

        let ops: Vec<WriteOp> = pipeline.into();
        assert!(matches!(ops[0], WriteOp::Upsert { score: 3, .. }));
        assert!(matches!(ops[1], WriteOp::DeleteRange { .. }));
    }
}
