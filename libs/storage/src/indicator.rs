//! Bucket-aligned indicator series with save-and-notify
//!
//! Each indicator family lives in one storage class; every horizon is its own
//! sub-series (`sma_5`, `sma_25`, ...). Saving publishes on the channel named
//! after the storage class unless the caller suppresses it.

use crate::error::{StoreError, StoreResult};
use crate::timeseries::TimeseriesStorage;
use crate::backend::OrderedStore;
use pubsub::PubSub;
use std::sync::Arc;
use tracing::debug;
use types::{ensure_aligned, AlignmentError, Horizon, PartitionKey, SeriesCoordinates, SeriesKind, FIVE_MINUTES};

/// Text encoding of a stored value
pub trait SeriesValue: Sized {
    fn encode(&self) -> String;
    fn decode(raw: &str) -> Option<Self>;
}

impl SeriesValue for f64 {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        raw.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// One indicator value, validated against the 5-minute grid on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorEntry<V> {
    pub partition: PartitionKey,
    pub timestamp: i64,
    pub horizon: Horizon,
    pub value: V,
}

impl<V: SeriesValue> IndicatorEntry<V> {
    pub fn new(partition: PartitionKey, timestamp: i64, horizon: Horizon, value: V) -> Result<Self, AlignmentError> {
        ensure_aligned(timestamp, FIVE_MINUTES)?;
        Ok(Self {
            partition,
            timestamp,
            horizon,
            value,
        })
    }
}

#[derive(Clone)]
pub struct IndicatorStorage {
    series: TimeseriesStorage,
    bus: PubSub,
}

impl IndicatorStorage {
    pub fn new(store: Arc<dyn OrderedStore>, kind: SeriesKind, bus: PubSub) -> StoreResult<Self> {
        if !kind.is_indicator() {
            return Err(StoreError::Types(types::TypesError::InvalidCoordinates(format!(
                "{} is not an indicator storage class",
                kind
            ))));
        }
        Ok(Self {
            series: TimeseriesStorage::new(store, kind),
            bus,
        })
    }

    pub fn kind(&self) -> SeriesKind {
        self.series.kind()
    }

    fn index(&self, horizon: Horizon) -> String {
        // indicator kinds always have a family
        horizon.index(self.kind().family().unwrap_or_default())
    }

    /// Persist `entry`, then notify subscribers when `publish` is set.
    pub async fn save<V: SeriesValue>(&self, entry: &IndicatorEntry<V>, publish: bool) -> StoreResult<()> {
        let index = self.index(entry.horizon);
        self.series
            .write(&entry.partition, &index, entry.timestamp, &entry.value.encode())
            .await?;

        debug!(
            ticker = %entry.partition.ticker,
            exchange = %entry.partition.exchange,
            timestamp = entry.timestamp,
            series = %index,
            "indicator saved"
        );

        if publish {
            let coords = SeriesCoordinates::new(&entry.partition, entry.timestamp)
                .with_index(index)
                .with_horizon(entry.horizon);
            self.bus.notify(self.kind(), &coords)?;
        }
        Ok(())
    }

    /// Value at exactly `timestamp`, or `None` when absent or undecodable
    pub async fn load<V: SeriesValue>(
        &self,
        partition: &PartitionKey,
        horizon: Horizon,
        timestamp: i64,
    ) -> StoreResult<Option<V>> {
        let entry = self.series.get(partition, &self.index(horizon), timestamp).await?;
        Ok(entry.and_then(|e| V::decode(&e.payload)))
    }

    /// Up to `count` values at or before `timestamp`, oldest first
    pub async fn history<V: SeriesValue>(
        &self,
        partition: &PartitionKey,
        horizon: Horizon,
        timestamp: i64,
        count: usize,
    ) -> StoreResult<Vec<(i64, V)>> {
        let entries = self
            .series
            .latest(partition, &self.index(horizon), timestamp, count)
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(|e| V::decode(&e.payload).map(|v| (e.timestamp, v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn eth_btc() -> PartitionKey {
        PartitionKey::new("ETH_BTC", "BITTREX")
    }

    #[test]
    fn test_entry_rejects_unaligned_timestamp() {
        assert!(IndicatorEntry::new(eth_btc(), 1000, Horizon(5), 1.0).is_err());
        assert!(IndicatorEntry::new(eth_btc(), 900, Horizon(5), 1.0).is_ok());
    }

    #[test]
    fn test_only_indicator_kinds_accepted() {
        let store: Arc<dyn OrderedStore> = Arc::new(MemoryStore::new());
        assert!(IndicatorStorage::new(store.clone(), SeriesKind::Price, PubSub::new(4)).is_err());
        assert!(IndicatorStorage::new(store, SeriesKind::Sma, PubSub::new(4)).is_ok());
    }

    #[tokio::test]
    async fn test_save_publishes_unless_suppressed() {
        let store = Arc::new(MemoryStore::new());
        let bus = PubSub::new(4);
        let mut subscription = bus.subscribe(&[SeriesKind::Sma]);
        let sma = IndicatorStorage::new(store.clone(), SeriesKind::Sma, bus.clone()).unwrap();

        let entry = IndicatorEntry::new(eth_btc(), 900, Horizon(5), 10.4).unwrap();
        sma.save(&entry, false).await.unwrap();
        assert!(subscription.try_next().is_none());

        sma.save(&entry, true).await.unwrap();
        let message = subscription.try_next().unwrap();
        let coords = SeriesCoordinates::from_payload(&message.payload).unwrap();
        assert_eq!(coords.timestamp, 900);
        assert_eq!(coords.index.as_deref(), Some("sma_5"));
        assert_eq!(coords.horizon, Some(Horizon(5)));

        assert_eq!(store.len("ETH_BTC:BITTREX:SmaStorage:sma_5"), 1);
        assert_eq!(sma.load::<f64>(&eth_btc(), Horizon(5), 900).await.unwrap(), Some(10.4));
        assert_eq!(sma.load::<f64>(&eth_btc(), Horizon(25), 900).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_history() {
        let store = Arc::new(MemoryStore::new());
        let rsi = IndicatorStorage::new(store, SeriesKind::Rsi, PubSub::new(4)).unwrap();
        for (i, value) in [40.0, 50.0, 60.0].iter().enumerate() {
            let entry = IndicatorEntry::new(eth_btc(), 300 * i as i64, Horizon(5), *value).unwrap();
            rsi.save(&entry, false).await.unwrap();
        }
        let history = rsi.history::<f64>(&eth_btc(), Horizon(5), 600, 2).await.unwrap();
        assert_eq!(history, vec![(300, 50.0), (600, 60.0)]);
    }
}
