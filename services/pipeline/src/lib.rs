//! # TA Pipeline
//!
//! Wires the resampler, indicator subscribers and event detector over one
//! ordered store, one bus and one signal repository. Every handle is built
//! here and passed down explicitly.
//!
//! ```text
//! raw ticks ─► PriceVolumeHistoryStorage ─► history_resample ─► PriceStorage / VolumeStorage
//!                                                                   │
//!                      sma / rsi / bbands / vbi subscribers ◄───────┘
//!                                   │
//!                                   └─► indicator channels ─► event_detector ─► events, signals
//! ```
//!
//! Bus delivery is at-most-once. [`Pipeline::rescan`] replays the indicator
//! and detection stages for a time range when notifications were missed.

pub mod jsonl;
pub mod logging;
pub mod sweep;

pub use jsonl::JsonlHistory;
pub use sweep::Sweeper;

use anyhow::{Context, Result};
use pubsub::{PubSub, Subscriber, SubscriberRunner};
use resampler::{HistoryResampleSubscriber, Resampler};
use settings::{Settings, StoreBackend};
use signals::Detector;
use std::sync::Arc;
use std::time::Duration;
use storage::{MemorySignalRepository, MemoryStore, OrderedStore, SignalRepository, TimeseriesStorage};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use types::{BatchReport, PartitionKey, SeriesCoordinates, SeriesKind};

pub struct Pipeline {
    settings: Settings,
    store: Arc<dyn OrderedStore>,
    bus: PubSub,
    repository: Arc<dyn SignalRepository>,
    resampler: Arc<Resampler>,
    indicators: Vec<Arc<dyn Subscriber>>,
    detector: Arc<Detector>,
}

impl Pipeline {
    pub fn new(settings: Settings, store: Arc<dyn OrderedStore>, repository: Arc<dyn SignalRepository>) -> Result<Self> {
        let bus = PubSub::new(settings.bus.subscription_capacity);
        let resampler = Arc::new(Resampler::new(store.clone(), bus.clone(), settings.store.pipeline_retries));
        let indicators = indicators::subscribers(&settings.indicators, store.clone(), bus.clone(), repository.clone())
            .context("Failed to build indicator subscribers")?;
        let detector = Arc::new(
            Detector::new(store.clone(), bus.clone(), repository.clone(), settings.events.clone())
                .context("Failed to build event detector")?,
        );

        Ok(Self {
            settings,
            store,
            bus,
            repository,
            resampler,
            indicators,
            detector,
        })
    }

    /// Build the store and repository the settings name
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let (store, repository): (Arc<dyn OrderedStore>, Arc<dyn SignalRepository>) = match settings.store.backend {
            StoreBackend::Memory => (Arc::new(MemoryStore::new()), Arc::new(MemorySignalRepository::new())),
        };
        Self::new(settings, store, repository)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn OrderedStore> {
        &self.store
    }

    pub fn bus(&self) -> &PubSub {
        &self.bus
    }

    pub fn repository(&self) -> &Arc<dyn SignalRepository> {
        &self.repository
    }

    pub fn resampler(&self) -> &Arc<Resampler> {
        &self.resampler
    }

    pub fn detector(&self) -> &Arc<Detector> {
        &self.detector
    }

    /// Every bus subscriber, upstream first
    pub fn subscribers(&self) -> Vec<Arc<dyn Subscriber>> {
        let mut subscribers: Vec<Arc<dyn Subscriber>> =
            vec![Arc::new(HistoryResampleSubscriber::new(self.resampler.clone()))];
        subscribers.extend(self.indicators.iter().cloned());
        subscribers.push(self.detector.clone());
        subscribers
    }

    /// Start one dispatch loop per subscriber and the sweep loop.
    ///
    /// Subscriptions are registered before this returns, so nothing
    /// published afterwards is missed by a loop that has not started yet.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> PipelineTasks {
        let idle = Duration::from_millis(self.settings.bus.idle_poll_ms);
        let mut tasks = Vec::new();

        for subscriber in self.subscribers() {
            let runner = SubscriberRunner::new(&self.bus, subscriber);
            let name = runner.name().to_string();
            tasks.push((name, tokio::spawn(runner.run(idle, shutdown.clone()))));
        }

        let sweeper = Sweeper::new(
            self.resampler.clone(),
            self.settings.partitions.clone(),
            self.settings.resampler.clone(),
        );
        tasks.push(("sweep".to_string(), tokio::spawn(sweeper.run(shutdown))));

        info!(tasks = tasks.len(), "pipeline started");
        PipelineTasks { tasks }
    }

    async fn rescan_partitions(&self) -> Result<Vec<PartitionKey>> {
        if !self.settings.partitions.is_empty() {
            return Ok(self.settings.partitions.clone());
        }
        TimeseriesStorage::new(self.store.clone(), SeriesKind::Price)
            .partitions()
            .await
            .context("Failed to list resampled partitions")
    }

    /// Replay indicators, then detection, for every resampled bucket in
    /// `[from, to]`.
    pub async fn rescan(&self, from: i64, to: i64) -> Result<BatchReport> {
        let mut buckets = Vec::new();
        for partition in self.rescan_partitions().await? {
            for timestamp in self
                .resampler
                .closed_buckets(&partition, from, to)
                .await
                .with_context(|| format!("Failed to list buckets of {}", partition))?
            {
                buckets.push(SeriesCoordinates::new(&partition, timestamp));
            }
        }

        let mut report = BatchReport::new();
        for subscriber in &self.indicators {
            let channel = subscriber.channels().first().copied().unwrap_or(SeriesKind::Price);
            report += pubsub::rescan(subscriber.as_ref(), channel, buckets.iter().cloned()).await;
        }
        report += pubsub::rescan(self.detector.as_ref(), SeriesKind::Rsi, buckets.iter().cloned()).await;

        info!(from, to, buckets = buckets.len(), %report, "rescan finished");
        Ok(report)
    }
}

/// Running dispatch and sweep loops
pub struct PipelineTasks {
    tasks: Vec<(String, JoinHandle<BatchReport>)>,
}

impl PipelineTasks {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every loop to stop and sum their reports
    pub async fn join(self) -> BatchReport {
        let mut total = BatchReport::new();
        for (name, task) in self.tasks {
            match task.await {
                Ok(report) => {
                    info!(task = %name, %report, "task finished");
                    total += report;
                }
                Err(e) => error!(task = %name, error = %e, "task panicked"),
            }
        }
        total
    }
}
