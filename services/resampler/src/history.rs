//! Raw tick history (`PriceVolumeHistoryStorage`)
//!
//! The raw series has a bucket width of one second, so every tick timestamp
//! is its own score and ticks inside one 5-minute bucket never collide.

use crate::bucket::RawBucket;
use crate::error::Result;
use pubsub::PubSub;
use std::sync::Arc;
use storage::{Order, OrderedStore, Pipeline, ScoreRange, StoreResult, TimeseriesStorage};
use tracing::{debug, warn};
use types::{timestamp_from_score, PartitionKey, PriceIndex, PriceTick, SeriesCoordinates, SeriesKind, FIVE_MINUTES};

#[derive(Clone)]
pub struct PriceVolumeHistory {
    series: TimeseriesStorage,
    bus: PubSub,
}

impl PriceVolumeHistory {
    pub fn new(store: Arc<dyn OrderedStore>, bus: PubSub) -> Self {
        Self {
            series: TimeseriesStorage::new(store, SeriesKind::PriceVolumeHistory),
            bus,
        }
    }

    pub fn with_pipeline_retries(mut self, retries: u32) -> Self {
        self.series = self.series.with_pipeline_retries(retries);
        self
    }

    /// Raw score range covered by the 5-minute bucket `score`
    pub fn raw_range(score: i64) -> ScoreRange {
        let start = timestamp_from_score(score, FIVE_MINUTES);
        ScoreRange::new(start, start + FIVE_MINUTES - 1)
    }

    /// Store every present field of `tick` in one pipeline, close last.
    ///
    /// With `publish`, each saved price index is announced on the history
    /// channel after the pipeline succeeds. Volume is never announced.
    /// Returns the number of fields written.
    pub async fn save_tick(&self, tick: &PriceTick, publish: bool) -> Result<usize> {
        let fields = tick.fields();
        if fields.is_empty() {
            return Ok(0);
        }

        let mut pipeline = Pipeline::new();
        for (index, value) in &fields {
            self.series
                .stage(&mut pipeline, &tick.partition, index.as_str(), tick.timestamp, &value.to_string())?;
        }
        self.series.submit(pipeline).await?;

        if publish {
            for (index, _) in fields.iter().filter(|(index, _)| index.is_price()) {
                let coords = SeriesCoordinates::new(&tick.partition, tick.timestamp).with_index(index.as_str());
                self.bus.notify(SeriesKind::PriceVolumeHistory, &coords)?;
            }
        }

        debug!(
            ticker = %tick.partition.ticker,
            exchange = %tick.partition.exchange,
            timestamp = tick.timestamp,
            fields = fields.len(),
            "tick saved"
        );
        Ok(fields.len())
    }

    /// Every raw value recorded inside bucket `score`
    pub async fn bucket(&self, partition: &PartitionKey, score: i64) -> StoreResult<RawBucket> {
        let range = Self::raw_range(score);
        let mut bucket = RawBucket::new(range.min);

        for index in PriceIndex::WRITE_ORDER {
            let entries = self
                .series
                .query(partition, index.as_str(), range, Order::Ascending, None)
                .await?;
            for entry in entries {
                match entry.as_f64() {
                    Some(value) => bucket.push(index, entry.timestamp, value),
                    None => warn!(
                        ticker = %partition.ticker,
                        exchange = %partition.exchange,
                        index = %index,
                        timestamp = entry.timestamp,
                        "ignoring non-numeric raw value"
                    ),
                }
            }
        }
        Ok(bucket)
    }

    /// Stage the removal of every raw value inside bucket `score`.
    pub fn stage_cleanup(&self, pipeline: &mut Pipeline, partition: &PartitionKey, score: i64) {
        for index in PriceIndex::WRITE_ORDER {
            self.series
                .stage_delete(pipeline, partition, index.as_str(), Self::raw_range(score));
        }
    }

    pub async fn partitions(&self) -> StoreResult<Vec<PartitionKey>> {
        self.series.partitions().await
    }
}
