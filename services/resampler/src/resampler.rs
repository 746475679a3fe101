//! Raw ticks to 5-minute OHLCV buckets
//!
//! Resampling one bucket runs in two steps:
//!
//! 1. **Stage**: read every raw index of the bucket. Without a close the
//!    bucket stays pending and nothing is written or deleted. When the
//!    bucket was already committed by an earlier pass, the raw values are
//!    folded into the stored candle instead.
//! 2. **Commit**: one atomic pipeline writes the five resampled values
//!    (close last) and then deletes the raw range. Only once it succeeded is
//!    the bucket published on `PriceStorage` and `VolumeStorage`.
//!
//! A failed commit leaves both the raw ticks and the stored candle as they
//! were, so the next pass recomputes the same bucket.

use crate::bucket::BucketState;
use crate::error::Result;
use crate::history::PriceVolumeHistory;
use futures::future::join_all;
use pubsub::PubSub;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storage::{Order, OrderedStore, Pipeline, ScoreRange, StoreResult, TimeseriesStorage};
use tracing::{debug, info, warn};
use types::{
    score_from_timestamp, timestamp_from_score, BatchReport, Ohlcv, PartitionKey, PriceIndex, SeriesCoordinates,
    SeriesKind, FIVE_MINUTES,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResampleOutcome {
    Empty,
    Pending,
    Complete(Ohlcv),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub report: BatchReport,
    /// Highest score every partition has been swept through
    pub checkpoint: i64,
}

/// Sweep ceiling for wall-clock `now`: `lag_buckets` behind the current bucket.
pub fn end_score_for(now: i64, lag_buckets: i64) -> i64 {
    score_from_timestamp(now, FIVE_MINUTES) - lag_buckets
}

#[derive(Clone)]
pub struct Resampler {
    history: PriceVolumeHistory,
    prices: TimeseriesStorage,
    volumes: TimeseriesStorage,
    bus: PubSub,
}

impl Resampler {
    pub fn new(store: Arc<dyn OrderedStore>, bus: PubSub, pipeline_retries: u32) -> Self {
        Self {
            history: PriceVolumeHistory::new(store.clone(), bus.clone()).with_pipeline_retries(pipeline_retries),
            prices: TimeseriesStorage::new(store.clone(), SeriesKind::Price).with_pipeline_retries(pipeline_retries),
            volumes: TimeseriesStorage::new(store, SeriesKind::Volume).with_pipeline_retries(pipeline_retries),
            bus,
        }
    }

    pub fn history(&self) -> &PriceVolumeHistory {
        &self.history
    }

    /// Resample bucket `score` of `partition`.
    pub async fn resample(&self, partition: &PartitionKey, score: i64) -> Result<ResampleOutcome> {
        let raw = self.history.bucket(partition, score).await?;
        if raw.is_empty() {
            return Ok(ResampleOutcome::Empty);
        }

        let ohlcv = match self.resampled(partition, raw.timestamp).await? {
            Some(committed) => {
                debug!(
                    ticker = %partition.ticker,
                    exchange = %partition.exchange,
                    score,
                    "folding late ticks into resampled bucket"
                );
                raw.fold_into(committed)
            }
            None => match raw.aggregate() {
                BucketState::Complete(ohlcv) => ohlcv,
                BucketState::Empty => return Ok(ResampleOutcome::Empty),
                BucketState::Pending => {
                    debug!(
                        ticker = %partition.ticker,
                        exchange = %partition.exchange,
                        score,
                        "bucket pending, no close yet"
                    );
                    return Ok(ResampleOutcome::Pending);
                }
            },
        };

        self.commit(partition, score, &ohlcv).await?;

        let coords = SeriesCoordinates::new(partition, ohlcv.timestamp);
        self.bus
            .notify(SeriesKind::Price, &coords.clone().with_index(PriceIndex::ClosePrice.as_str()))?;
        self.bus
            .notify(SeriesKind::Volume, &coords.with_index(PriceIndex::CloseVolume.as_str()))?;

        debug!(
            ticker = %partition.ticker,
            exchange = %partition.exchange,
            timestamp = ohlcv.timestamp,
            close = ohlcv.close,
            "bucket resampled"
        );
        Ok(ResampleOutcome::Complete(ohlcv))
    }

    /// Candle already stored for bucket `timestamp`, if its close exists
    pub async fn resampled(&self, partition: &PartitionKey, timestamp: i64) -> StoreResult<Option<Ohlcv>> {
        let Some(close) = self.stored(partition, PriceIndex::ClosePrice, timestamp).await? else {
            return Ok(None);
        };
        let open = self.stored(partition, PriceIndex::OpenPrice, timestamp).await?;
        let high = self.stored(partition, PriceIndex::HighPrice, timestamp).await?;
        let low = self.stored(partition, PriceIndex::LowPrice, timestamp).await?;
        let volume = self.stored(partition, PriceIndex::CloseVolume, timestamp).await?;

        Ok(Some(Ohlcv {
            timestamp,
            open: open.unwrap_or(close),
            high: high.unwrap_or(close),
            low: low.unwrap_or(close),
            close,
            volume: volume.unwrap_or(0.0),
        }))
    }

    async fn stored(&self, partition: &PartitionKey, index: PriceIndex, timestamp: i64) -> StoreResult<Option<f64>> {
        let entry = self.series(index).get(partition, index.as_str(), timestamp).await?;
        Ok(entry.and_then(|e| e.as_f64()))
    }

    fn series(&self, index: PriceIndex) -> &TimeseriesStorage {
        match index.resampled_kind() {
            SeriesKind::Volume => &self.volumes,
            _ => &self.prices,
        }
    }

    /// Write the candle, then drop the raw range, in a single submit.
    async fn commit(&self, partition: &PartitionKey, score: i64, ohlcv: &Ohlcv) -> Result<()> {
        let mut pipeline = Pipeline::new();
        for index in PriceIndex::WRITE_ORDER {
            self.series(index).stage(
                &mut pipeline,
                partition,
                index.as_str(),
                ohlcv.timestamp,
                &ohlcv.value(index).to_string(),
            )?;
        }
        self.history.stage_cleanup(&mut pipeline, partition, score);
        self.prices.submit(pipeline).await?;
        Ok(())
    }

    /// Resample buckets `(after_score, end_score]` of every partition.
    ///
    /// Partitions run concurrently, buckets within a partition in ascending
    /// order. `stop` is honoured between buckets. Store faults are counted as
    /// failed buckets and the sweep moves on.
    pub async fn sweep(
        &self,
        partitions: &[PartitionKey],
        after_score: i64,
        end_score: i64,
        stop: &AtomicBool,
    ) -> SweepReport {
        let results = join_all(
            partitions
                .iter()
                .map(|partition| self.sweep_partition(partition, after_score, end_score, stop)),
        )
        .await;

        let mut sweep = SweepReport {
            report: BatchReport::new(),
            checkpoint: end_score.max(after_score),
        };
        for (report, checkpoint) in results {
            sweep.report += report;
            sweep.checkpoint = sweep.checkpoint.min(checkpoint);
        }

        info!(
            partitions = partitions.len(),
            after_score,
            end_score,
            checkpoint = sweep.checkpoint,
            report = %sweep.report,
            "sweep finished"
        );
        sweep
    }

    async fn sweep_partition(
        &self,
        partition: &PartitionKey,
        after_score: i64,
        end_score: i64,
        stop: &AtomicBool,
    ) -> (BatchReport, i64) {
        let mut report = BatchReport::new();
        let mut checkpoint = after_score;

        for score in (after_score + 1)..=end_score {
            if stop.load(Ordering::SeqCst) {
                info!(ticker = %partition.ticker, exchange = %partition.exchange, score, "sweep stopped");
                break;
            }
            match self.resample(partition, score).await {
                Ok(ResampleOutcome::Complete(_)) => report.record_processed(),
                Ok(ResampleOutcome::Pending) | Ok(ResampleOutcome::Empty) => report.record_skipped(),
                Err(e) => {
                    warn!(
                        ticker = %partition.ticker,
                        exchange = %partition.exchange,
                        score,
                        error = %e,
                        "resample failed, continuing sweep"
                    );
                    report.record_failed();
                }
            }
            checkpoint = score;
        }
        (report, checkpoint)
    }

    /// Timestamp of the earliest resampled close of `partition`
    pub async fn earliest_timestamp(&self, partition: &PartitionKey) -> StoreResult<Option<i64>> {
        let first = self
            .prices
            .query(
                partition,
                PriceIndex::ClosePrice.as_str(),
                ScoreRange::all(),
                Order::Ascending,
                Some(1),
            )
            .await?;
        Ok(first.first().map(|entry| entry.timestamp))
    }

    /// Bucket timestamps in `[from, to]` that hold a resampled close
    pub async fn closed_buckets(&self, partition: &PartitionKey, from: i64, to: i64) -> StoreResult<Vec<i64>> {
        let entries = self
            .prices
            .query(
                partition,
                PriceIndex::ClosePrice.as_str(),
                self.prices.score_range(from, to),
                Order::Ascending,
                None,
            )
            .await?;
        Ok(entries.iter().map(|e| timestamp_from_score(e.score, FIVE_MINUTES)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStore;
    use types::PriceTick;

    fn eth_btc() -> PartitionKey {
        PartitionKey::new("ETH_BTC", "BITTREX")
    }

    fn setup() -> (Arc<MemoryStore>, PubSub, Resampler) {
        let store = Arc::new(MemoryStore::new());
        let bus = PubSub::new(64);
        let resampler = Resampler::new(store.clone(), bus.clone(), 0);
        (store, bus, resampler)
    }

    fn full_tick(timestamp: i64) -> PriceTick {
        let mut tick = PriceTick::new(eth_btc(), timestamp);
        tick.open = Some(10.0);
        tick.high = Some(12.0);
        tick.low = Some(9.0);
        tick.close = Some(11.0);
        tick.volume = Some(100.0);
        tick
    }

    const RAW_CLOSE: &str = "ETH_BTC:BITTREX:PriceVolumeHistoryStorage:close_price";
    const RAW_OPEN: &str = "ETH_BTC:BITTREX:PriceVolumeHistoryStorage:open_price";

    #[tokio::test]
    async fn test_pending_bucket_is_untouched() {
        let (store, _bus, resampler) = setup();
        let mut tick = full_tick(1000);
        tick.close = None;
        tick.volume = None;
        resampler.history().save_tick(&tick, false).await.unwrap();

        assert_eq!(resampler.resample(&eth_btc(), 3).await.unwrap(), ResampleOutcome::Pending);
        assert!(store.is_empty("ETH_BTC:BITTREX:PriceStorage:close_price"));
        assert_eq!(store.len(RAW_OPEN), 1);
    }

    #[tokio::test]
    async fn test_complete_bucket_written_and_raw_cleared() {
        let (store, bus, resampler) = setup();
        let mut subscription = bus.subscribe(&[SeriesKind::Price, SeriesKind::Volume]);
        resampler.history().save_tick(&full_tick(1000), false).await.unwrap();

        let outcome = resampler.resample(&eth_btc(), 3).await.unwrap();
        let ResampleOutcome::Complete(ohlcv) = outcome else {
            panic!("expected a complete bucket, got {:?}", outcome);
        };
        assert_eq!(ohlcv.timestamp, 900);

        for (index, expected) in [("open_price", 10.0), ("high_price", 12.0), ("low_price", 9.0), ("close_price", 11.0)] {
            let key = format!("ETH_BTC:BITTREX:PriceStorage:{}", index);
            assert_eq!(store.len(&key), 1, "{}", key);
            let stored = store
                .range(&key, ScoreRange::single(3), Order::Ascending, None)
                .await
                .unwrap();
            assert_eq!(stored[0].1, format!("900:{}", expected));
        }
        assert_eq!(store.len("ETH_BTC:BITTREX:VolumeStorage:close_volume"), 1);
        assert!(store.is_empty(RAW_CLOSE));
        assert!(store.is_empty(RAW_OPEN));

        let channels: Vec<String> = std::iter::from_fn(|| subscription.try_next())
            .map(|m| m.channel)
            .collect();
        assert_eq!(channels, vec!["PriceStorage", "VolumeStorage"]);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_raw_ticks() {
        let (store, _bus, resampler) = setup();
        resampler.history().save_tick(&full_tick(1000), false).await.unwrap();

        // bucket read succeeds, then the commit pipeline fails
        store.set_read_only(true);
        assert!(resampler.resample(&eth_btc(), 3).await.is_err());
        assert_eq!(store.len(RAW_CLOSE), 1);
        assert!(store.is_empty("ETH_BTC:BITTREX:PriceStorage:close_price"));

        // retried pass recovers
        store.set_read_only(false);
        let outcome = resampler.resample(&eth_btc(), 3).await.unwrap();
        assert!(matches!(outcome, ResampleOutcome::Complete(_)));
        assert!(store.is_empty(RAW_CLOSE));
    }

    #[tokio::test]
    async fn test_sweep_reports_and_continues_past_pending() {
        let (_store, _bus, resampler) = setup();
        let xrp = PartitionKey::new("XRP_BTC", "BITTREX");

        resampler.history().save_tick(&full_tick(1000), false).await.unwrap();
        let mut open_only = PriceTick::new(eth_btc(), 1300);
        open_only.open = Some(10.0);
        resampler.history().save_tick(&open_only, false).await.unwrap();
        let mut xrp_tick = full_tick(1600);
        xrp_tick.partition = xrp.clone();
        resampler.history().save_tick(&xrp_tick, false).await.unwrap();

        let stop = AtomicBool::new(false);
        let sweep = resampler.sweep(&[eth_btc(), xrp], 2, 5, &stop).await;

        // scores 3, 4, 5 for two partitions
        assert_eq!(sweep.report.total(), 6);
        assert_eq!(sweep.report.processed, 2);
        assert_eq!(sweep.report.skipped, 4);
        assert_eq!(sweep.checkpoint, 5);
    }

    #[tokio::test]
    async fn test_stopped_sweep_keeps_checkpoint() {
        let (_store, _bus, resampler) = setup();
        let stop = AtomicBool::new(true);
        let sweep = resampler.sweep(&[eth_btc()], 2, 10, &stop).await;
        assert_eq!(sweep.report.total(), 0);
        assert_eq!(sweep.checkpoint, 2);
    }

    #[tokio::test]
    async fn test_sweep_counts_store_faults() {
        let (store, _bus, resampler) = setup();
        store.set_available(false);
        let stop = AtomicBool::new(false);
        let sweep = resampler.sweep(&[eth_btc()], 0, 3, &stop).await;
        assert_eq!(sweep.report.failed, 3);
        assert_eq!(sweep.checkpoint, 3);
    }

    #[test]
    fn test_end_score_for() {
        assert_eq!(end_score_for(1000, 1), 2);
        assert_eq!(end_score_for(900, 1), 2);
    }

    #[tokio::test]
    async fn test_earliest_and_closed_buckets() {
        let (_store, _bus, resampler) = setup();
        assert_eq!(resampler.earliest_timestamp(&eth_btc()).await.unwrap(), None);

        resampler.history().save_tick(&full_tick(1000), false).await.unwrap();
        resampler.history().save_tick(&full_tick(1900), false).await.unwrap();
        resampler.resample(&eth_btc(), 3).await.unwrap();
        resampler.resample(&eth_btc(), 6).await.unwrap();

        assert_eq!(resampler.earliest_timestamp(&eth_btc()).await.unwrap(), Some(900));
        assert_eq!(resampler.closed_buckets(&eth_btc(), 0, 3000).await.unwrap(), vec![900, 1800]);
    }
}
