//! Indicator snapshots read at one bucket
//!
//! Every field is optional: a value that has not been computed yet is simply
//! absent, never an error.

use indicators::{Bands, Vbi};
use pubsub::PubSub;
use settings::EventSettings;
use std::sync::Arc;
use storage::{IndicatorStorage, OrderedStore, StoreResult, TimeseriesStorage};
use types::{align_down, PartitionKey, PriceIndex, SeriesKind, FIVE_MINUTES};

/// Values at bucket `timestamp` and the bucket before it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub timestamp: i64,
    pub close: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume: Option<f64>,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub rsi: Option<f64>,
    pub bands: Option<Bands>,
    pub prev_bands: Option<Bands>,
    pub vbi: Option<Vbi>,
    pub prev_vbi: Option<Vbi>,
}

/// Trend context from the start of the longer resample period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongSnapshot {
    pub timestamp: i64,
    pub sma_short: f64,
    pub sma_long: f64,
}

#[derive(Clone)]
pub struct SnapshotReader {
    prices: TimeseriesStorage,
    volumes: TimeseriesStorage,
    sma: IndicatorStorage,
    rsi: IndicatorStorage,
    bbands: IndicatorStorage,
    vbi: IndicatorStorage,
    settings: EventSettings,
}

impl SnapshotReader {
    pub fn new(store: Arc<dyn OrderedStore>, bus: PubSub, settings: EventSettings) -> StoreResult<Self> {
        Ok(Self {
            prices: TimeseriesStorage::new(store.clone(), SeriesKind::Price),
            volumes: TimeseriesStorage::new(store.clone(), SeriesKind::Volume),
            sma: IndicatorStorage::new(store.clone(), SeriesKind::Sma, bus.clone())?,
            rsi: IndicatorStorage::new(store.clone(), SeriesKind::Rsi, bus.clone())?,
            bbands: IndicatorStorage::new(store.clone(), SeriesKind::Bbands, bus.clone())?,
            vbi: IndicatorStorage::new(store, SeriesKind::Vbi, bus)?,
            settings,
        })
    }

    pub fn settings(&self) -> &EventSettings {
        &self.settings
    }

    pub async fn read(&self, partition: &PartitionKey, timestamp: i64) -> StoreResult<Snapshot> {
        let previous = timestamp - FIVE_MINUTES;
        let horizon = self.settings.evaluation_horizon;

        Ok(Snapshot {
            timestamp,
            close: self.value(&self.prices, partition, PriceIndex::ClosePrice, timestamp).await?,
            prev_close: self.value(&self.prices, partition, PriceIndex::ClosePrice, previous).await?,
            volume: self.value(&self.volumes, partition, PriceIndex::CloseVolume, timestamp).await?,
            sma_short: self.sma.load(partition, self.settings.short_sma_horizon, timestamp).await?,
            sma_long: self.sma.load(partition, self.settings.long_sma_horizon, timestamp).await?,
            rsi: self.rsi.load(partition, horizon, timestamp).await?,
            bands: self.bbands.load(partition, horizon, timestamp).await?,
            prev_bands: self.bbands.load(partition, horizon, previous).await?,
            vbi: self.vbi.load(partition, horizon, timestamp).await?,
            prev_vbi: self.vbi.load(partition, horizon, previous).await?,
        })
    }

    /// SMA trend at the start of the long period containing `timestamp`,
    /// or `None` until both averages exist there.
    pub async fn read_long(&self, partition: &PartitionKey, timestamp: i64) -> StoreResult<Option<LongSnapshot>> {
        let long_ts = align_down(timestamp, self.settings.long_resample_width);
        let short = self.sma.load(partition, self.settings.short_sma_horizon, long_ts).await?;
        let long = self.sma.load(partition, self.settings.long_sma_horizon, long_ts).await?;
        Ok(short.zip(long).map(|(sma_short, sma_long)| LongSnapshot {
            timestamp: long_ts,
            sma_short,
            sma_long,
        }))
    }

    async fn value(
        &self,
        series: &TimeseriesStorage,
        partition: &PartitionKey,
        index: PriceIndex,
        timestamp: i64,
    ) -> StoreResult<Option<f64>> {
        Ok(series
            .get(partition, index.as_str(), timestamp)
            .await?
            .and_then(|entry| entry.as_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{IndicatorEntry, MemoryStore};
    use types::{Horizon, DAY};

    fn eth_btc() -> PartitionKey {
        PartitionKey::new("ETH_BTC", "BITTREX")
    }

    #[tokio::test]
    async fn test_missing_values_stay_absent() {
        let store = Arc::new(MemoryStore::new());
        let reader = SnapshotReader::new(store.clone(), PubSub::new(4), EventSettings::default()).unwrap();
        let prices = TimeseriesStorage::new(store, SeriesKind::Price);
        prices.write(&eth_btc(), "close_price", DAY, "0.05").await.unwrap();

        let snapshot = reader.read(&eth_btc(), DAY).await.unwrap();
        assert_eq!(snapshot.close, Some(0.05));
        assert_eq!(snapshot.prev_close, None);
        assert_eq!(snapshot.rsi, None);
        assert_eq!(snapshot.bands, None);
    }

    #[tokio::test]
    async fn test_long_snapshot_reads_period_start() {
        let store = Arc::new(MemoryStore::new());
        let bus = PubSub::new(4);
        let reader = SnapshotReader::new(store.clone(), bus.clone(), EventSettings::default()).unwrap();
        let sma = IndicatorStorage::new(store, SeriesKind::Sma, bus).unwrap();

        let t = DAY * 10 + 3_600;
        assert_eq!(reader.read_long(&eth_btc(), t).await.unwrap(), None);

        for (horizon, value) in [(Horizon(25), 2.0), (Horizon(100), 1.0)] {
            let entry = IndicatorEntry::new(eth_btc(), DAY * 10, horizon, value).unwrap();
            sma.save(&entry, false).await.unwrap();
        }
        let long = reader.read_long(&eth_btc(), t).await.unwrap().unwrap();
        assert_eq!(long.timestamp, DAY * 10);
        assert!(long.sma_short > long.sma_long);
    }
}
