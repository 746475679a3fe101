//! Indicator seam and the generic subscriber that drives it

use crate::error::IndicatorError;
use crate::window::PriceWindow;
use anyhow::Context;
use async_trait::async_trait;
use pubsub::{PubSub, Subscriber};
use std::fmt::Debug;
use std::sync::Arc;
use storage::{
    IndicatorEntry, IndicatorStorage, OrderedStore, PersistenceError, SeriesValue, SignalRepository, StoreResult,
};
use tracing::{debug, error, info};
use types::{ensure_aligned, BatchReport, Horizon, PartitionKey, PriceIndex, SeriesCoordinates, SeriesKind, Signal, FIVE_MINUTES};

/// One indicator family
#[async_trait]
pub trait Indicator: Send + Sync + 'static {
    type Value: SeriesValue + Debug + Send + Sync;

    /// Storage class the values are written to
    fn kind(&self) -> SeriesKind;

    /// Upstream channels that trigger a recompute
    fn upstream(&self) -> &[SeriesKind];

    async fn compute(
        &self,
        window: &PriceWindow,
        partition: &PartitionKey,
        timestamp: i64,
        horizon: Horizon,
    ) -> Result<Self::Value, IndicatorError>;

    /// A signal raised directly from a freshly computed value
    fn signal(&self, _entry: &IndicatorEntry<Self::Value>) -> Option<Signal> {
        None
    }
}

/// Recomputes one indicator for every configured horizon on each upstream
/// notification, then saves and publishes.
pub struct IndicatorSubscriber<I> {
    name: String,
    indicator: I,
    storage: IndicatorStorage,
    window: PriceWindow,
    horizons: Vec<Horizon>,
    signals: Option<Arc<dyn SignalRepository>>,
}

impl<I: Indicator> IndicatorSubscriber<I> {
    pub fn new(indicator: I, store: Arc<dyn OrderedStore>, bus: PubSub, horizons: Vec<Horizon>) -> StoreResult<Self> {
        let kind = indicator.kind();
        Ok(Self {
            name: format!("{}_subscriber", kind.family().unwrap_or("indicator")),
            storage: IndicatorStorage::new(store.clone(), kind, bus)?,
            window: PriceWindow::new(store),
            indicator,
            horizons,
            signals: None,
        })
    }

    /// Persist signals the indicator raises
    pub fn with_signals(mut self, repository: Arc<dyn SignalRepository>) -> Self {
        self.signals = Some(repository);
        self
    }

    pub fn storage(&self) -> &IndicatorStorage {
        &self.storage
    }

    /// Compute, save and publish every horizon at `timestamp`.
    ///
    /// Horizons without enough upstream history are skipped; any other
    /// failure stops the pass.
    pub async fn recompute(&self, partition: &PartitionKey, timestamp: i64) -> Result<BatchReport, IndicatorError> {
        ensure_aligned(timestamp, FIVE_MINUTES)?;

        let mut report = BatchReport::new();
        for &horizon in &self.horizons {
            let value = match self.indicator.compute(&self.window, partition, timestamp, horizon).await {
                Ok(value) => value,
                Err(e) if e.is_missing_data() => {
                    debug!(
                        ticker = %partition.ticker,
                        exchange = %partition.exchange,
                        timestamp,
                        horizon = horizon.0,
                        indicator = %self.indicator.kind(),
                        reason = %e,
                        "skipping horizon"
                    );
                    report.record_skipped();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let entry = IndicatorEntry::new(partition.clone(), timestamp, horizon, value)?;
            self.storage.save(&entry, true).await?;
            report.record_processed();

            if let Some(signal) = self.indicator.signal(&entry) {
                self.persist_signal(signal).await;
            }
        }
        Ok(report)
    }

    async fn persist_signal(&self, signal: Signal) {
        let Some(repository) = &self.signals else {
            return;
        };
        let key = signal.key();
        match repository.insert_signal(signal).await {
            Ok(()) => info!(signal = %key, "indicator signal raised"),
            Err(PersistenceError::Duplicate(_)) => debug!(signal = %key, "indicator signal already recorded"),
            Err(e) => error!(signal = %key, error = %e, "failed to persist indicator signal"),
        }
    }
}

#[async_trait]
impl<I: Indicator> Subscriber for IndicatorSubscriber<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn channels(&self) -> &[SeriesKind] {
        self.indicator.upstream()
    }

    async fn handle(&self, channel: SeriesKind, coords: &SeriesCoordinates) -> anyhow::Result<()> {
        let trigger = match channel {
            SeriesKind::Volume => PriceIndex::CloseVolume,
            _ => PriceIndex::ClosePrice,
        };
        if coords.index.as_deref().is_some_and(|index| index != trigger.as_str()) {
            return Ok(());
        }

        let partition = coords.partition();
        self.recompute(&partition, coords.timestamp)
            .await
            .with_context(|| format!("{} recompute for {} at {}", self.name, partition, coords.timestamp))?;
        Ok(())
    }
}
