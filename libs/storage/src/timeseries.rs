//! Time-series facade over an [`OrderedStore`]
//!
//! One `TimeseriesStorage` serves one [`SeriesKind`]. Entries are stored as
//! `(score, "timestamp:payload")` where `score = timestamp / bucket_width`.

use crate::backend::{Order, OrderedStore, Pipeline, ScoreRange};
use crate::error::{StoreError, StoreResult};
use std::sync::Arc;
use tracing::trace;
use types::{
    ensure_aligned, score_from_timestamp, timestamp_from_score, AlignmentError, PartitionKey, SeriesKey,
    SeriesKind,
};

/// A decoded series member
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub score: i64,
    pub timestamp: i64,
    pub payload: String,
}

impl SeriesEntry {
    fn decode(key: &SeriesKey, score: i64, member: &str) -> StoreResult<Self> {
        let malformed = |reason: &str| StoreError::Decode {
            key: key.to_string(),
            score,
            reason: reason.to_string(),
        };
        let (timestamp, payload) = member.split_once(':').ok_or_else(|| malformed("missing timestamp"))?;
        let timestamp = timestamp.parse::<i64>().map_err(|_| malformed("non-numeric timestamp"))?;
        Ok(Self {
            score,
            timestamp,
            payload: payload.to_string(),
        })
    }

    pub fn encode(timestamp: i64, payload: &str) -> String {
        format!("{}:{}", timestamp, payload)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.payload.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

#[derive(Clone)]
pub struct TimeseriesStorage {
    store: Arc<dyn OrderedStore>,
    kind: SeriesKind,
    pipeline_retries: u32,
}

impl TimeseriesStorage {
    pub fn new(store: Arc<dyn OrderedStore>, kind: SeriesKind) -> Self {
        Self {
            store,
            kind,
            pipeline_retries: 0,
        }
    }

    pub fn with_pipeline_retries(mut self, retries: u32) -> Self {
        self.pipeline_retries = retries;
        self
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<dyn OrderedStore> {
        &self.store
    }

    pub fn key(&self, partition: &PartitionKey, index: &str) -> SeriesKey {
        SeriesKey::new(partition.clone(), self.kind, index)
    }

    pub fn score(&self, timestamp: i64) -> i64 {
        score_from_timestamp(timestamp, self.kind.bucket_width())
    }

    pub fn timestamp(&self, score: i64) -> i64 {
        timestamp_from_score(score, self.kind.bucket_width())
    }

    /// Score range covering `[from, to]` in wall-clock seconds
    pub fn score_range(&self, from: i64, to: i64) -> ScoreRange {
        ScoreRange::new(self.score(from), self.score(to))
    }

    /// Upsert one entry. Unaligned timestamps fail before any I/O.
    pub async fn write(&self, partition: &PartitionKey, index: &str, timestamp: i64, payload: &str) -> StoreResult<()> {
        ensure_aligned(timestamp, self.kind.bucket_width())?;
        let key = self.key(partition, index);
        trace!(key = %key, timestamp, "write");
        self.store
            .upsert(&key.to_string(), self.score(timestamp), SeriesEntry::encode(timestamp, payload))
            .await
    }

    /// Add an upsert to `pipeline` instead of writing immediately.
    pub fn stage(
        &self,
        pipeline: &mut Pipeline,
        partition: &PartitionKey,
        index: &str,
        timestamp: i64,
        payload: &str,
    ) -> Result<(), AlignmentError> {
        ensure_aligned(timestamp, self.kind.bucket_width())?;
        pipeline.upsert(
            &self.key(partition, index),
            self.score(timestamp),
            SeriesEntry::encode(timestamp, payload),
        );
        Ok(())
    }

    pub fn stage_delete(&self, pipeline: &mut Pipeline, partition: &PartitionKey, index: &str, range: ScoreRange) {
        pipeline.delete_range(&self.key(partition, index), range);
    }

    pub async fn submit(&self, pipeline: Pipeline) -> StoreResult<()> {
        pipeline.submit(self.store.as_ref(), self.pipeline_retries).await
    }

    pub async fn query(
        &self,
        partition: &PartitionKey,
        index: &str,
        range: ScoreRange,
        order: Order,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SeriesEntry>> {
        let key = self.key(partition, index);
        self.store
            .range(&key.to_string(), range, order, limit)
            .await?
            .into_iter()
            .map(|(score, member)| SeriesEntry::decode(&key, score, &member))
            .collect()
    }

    /// The `count` most recent entries at or before `timestamp`, oldest first.
    pub async fn latest(
        &self,
        partition: &PartitionKey,
        index: &str,
        timestamp: i64,
        count: usize,
    ) -> StoreResult<Vec<SeriesEntry>> {
        let mut entries = self
            .query(
                partition,
                index,
                ScoreRange::up_to(self.score(timestamp)),
                Order::Descending,
                Some(count),
            )
            .await?;
        entries.reverse();
        Ok(entries)
    }

    pub async fn get(&self, partition: &PartitionKey, index: &str, timestamp: i64) -> StoreResult<Option<SeriesEntry>> {
        let score = self.score(timestamp);
        let mut entries = self
            .query(partition, index, ScoreRange::single(score), Order::Ascending, Some(1))
            .await?;
        Ok(entries.pop())
    }

    pub async fn delete_range(&self, partition: &PartitionKey, index: &str, range: ScoreRange) -> StoreResult<usize> {
        let key = self.key(partition, index);
        self.store.delete_range(&key.to_string(), range).await
    }

    /// Partitions with at least one series of this kind
    pub async fn partitions(&self) -> StoreResult<Vec<PartitionKey>> {
        let marker = format!(":{}:", self.kind.storage_class());
        let mut partitions: Vec<PartitionKey> = self
            .store
            .keys("")
            .await?
            .iter()
            .filter_map(|key| {
                let (partition, _) = key.split_once(&marker)?;
                partition.parse::<PartitionKey>().ok()
            })
            .collect();
        partitions.sort();
        partitions.dedup();
        Ok(partitions)
    }
}
