//! Upstream windows read from the resampled series

use crate::error::IndicatorError;
use std::sync::Arc;
use storage::{OrderedStore, TimeseriesStorage};
use types::{PartitionKey, PriceIndex, SeriesKind};

/// Reads the most recent resampled closes and volumes ending at a bucket
#[derive(Clone)]
pub struct PriceWindow {
    prices: TimeseriesStorage,
    volumes: TimeseriesStorage,
}

impl PriceWindow {
    pub fn new(store: Arc<dyn OrderedStore>) -> Self {
        Self {
            prices: TimeseriesStorage::new(store.clone(), SeriesKind::Price),
            volumes: TimeseriesStorage::new(store, SeriesKind::Volume),
        }
    }

    /// The last `count` closes at or before `timestamp`, oldest first.
    /// The window must end exactly at `timestamp`.
    pub async fn closes(&self, partition: &PartitionKey, timestamp: i64, count: usize) -> Result<Vec<f64>, IndicatorError> {
        read(&self.prices, partition, PriceIndex::ClosePrice, timestamp, count).await
    }

    pub async fn volumes(&self, partition: &PartitionKey, timestamp: i64, count: usize) -> Result<Vec<f64>, IndicatorError> {
        read(&self.volumes, partition, PriceIndex::CloseVolume, timestamp, count).await
    }
}

async fn read(
    series: &TimeseriesStorage,
    partition: &PartitionKey,
    index: PriceIndex,
    timestamp: i64,
    count: usize,
) -> Result<Vec<f64>, IndicatorError> {
    let entries = series.latest(partition, index.as_str(), timestamp, count).await?;
    if entries.last().map(|e| e.timestamp) != Some(timestamp) {
        return Err(IndicatorError::MissingData {
            needed: count,
            available: 0,
        });
    }

    let values: Vec<f64> = entries.iter().filter_map(|e| e.as_f64()).collect();
    if values.len() < count {
        return Err(IndicatorError::MissingData {
            needed: count,
            available: values.len(),
        });
    }
    Ok(values)
}
