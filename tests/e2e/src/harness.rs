//! Synchronous driver over a wired pipeline

use anyhow::Result;
use pubsub::{PollOutcome, SubscriberRunner};
use settings::Settings;
use std::sync::Arc;
use storage::MemoryStore;
use storage::{MemorySignalRepository, OrderedStore, SignalRepository};
use ta_pipeline::Pipeline;
use tracing::warn;
use types::{BatchReport, PriceTick};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub repository: Arc<MemorySignalRepository>,
    pub pipeline: Pipeline,
    runners: Vec<SubscriberRunner>,
}

impl Harness {
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let repository = Arc::new(MemorySignalRepository::new());
        let pipeline = Pipeline::new(
            settings,
            store.clone() as Arc<dyn OrderedStore>,
            repository.clone() as Arc<dyn SignalRepository>,
        )?;
        let runners = pipeline
            .subscribers()
            .into_iter()
            .map(|subscriber| SubscriberRunner::new(pipeline.bus(), subscriber))
            .collect();

        Ok(Self {
            store,
            repository,
            pipeline,
            runners,
        })
    }

    /// Harness without bus subscriptions; notifications go nowhere
    pub fn detached(settings: Settings) -> Result<Self> {
        let mut harness = Self::new(settings)?;
        harness.runners.clear();
        Ok(harness)
    }

    /// Poll every subscriber, upstream first, until none has anything pending
    pub async fn pump(&mut self) -> BatchReport {
        let mut report = BatchReport::new();
        loop {
            let mut progressed = false;
            for runner in &mut self.runners {
                match runner.poll().await {
                    Ok(PollOutcome::Idle) => {}
                    Ok(PollOutcome::Dispatched) => {
                        report.record_processed();
                        progressed = true;
                    }
                    Ok(PollOutcome::Discarded) => {
                        report.record_skipped();
                        progressed = true;
                    }
                    Err(fault) => {
                        warn!(subscriber = %fault.subscriber, error = ?fault.source, "fault while pumping");
                        report.record_failed();
                        progressed = true;
                    }
                }
            }
            if !progressed {
                return report;
            }
        }
    }

    /// Save a tick with notifications on, then pump
    pub async fn ingest(&mut self, tick: &PriceTick) -> Result<BatchReport> {
        self.pipeline.resampler().history().save_tick(tick, true).await?;
        Ok(self.pump().await)
    }
}
