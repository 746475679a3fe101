//! Scheduled resample sweeps

use chrono::Utc;
use resampler::{end_score_for, Resampler, SweepReport};
use settings::ResamplerSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use types::{BatchReport, PartitionKey};

/// Runs a sweep every `sweep_interval_secs`, resuming from the lowest
/// checkpoint of the previous pass.
///
/// Each pass re-covers at least `lookback_buckets`, so buckets left pending
/// by a late close are retried until they age out of the window.
pub struct Sweeper {
    resampler: Arc<Resampler>,
    partitions: Vec<PartitionKey>,
    settings: ResamplerSettings,
    checkpoint: Option<i64>,
}

impl Sweeper {
    /// With no configured partitions, every partition present in the raw
    /// history is swept.
    pub fn new(resampler: Arc<Resampler>, partitions: Vec<PartitionKey>, settings: ResamplerSettings) -> Self {
        Self {
            resampler,
            partitions,
            settings,
            checkpoint: None,
        }
    }

    pub fn checkpoint(&self) -> Option<i64> {
        self.checkpoint
    }

    /// `(after_score, end_score]` of the pass run at wall-clock `now`
    pub fn window(&self, now: i64) -> (i64, i64) {
        let end = end_score_for(now, self.settings.lag_buckets);
        let floor = end - self.settings.lookback_buckets;
        let after = match self.checkpoint {
            Some(checkpoint) => checkpoint.min(floor),
            None if self.settings.start_score > 0 => self.settings.start_score - 1,
            None => floor,
        };
        (after, end)
    }

    async fn partitions(&self) -> Vec<PartitionKey> {
        if !self.partitions.is_empty() {
            return self.partitions.clone();
        }
        match self.resampler.history().partitions().await {
            Ok(partitions) => partitions,
            Err(e) => {
                warn!(error = %e, "failed to list partitions, skipping pass");
                Vec::new()
            }
        }
    }

    pub async fn pass(&mut self, now: i64, stop: &AtomicBool) -> SweepReport {
        let (after, end) = self.window(now);
        let partitions = self.partitions().await;
        let sweep = self.resampler.sweep(&partitions, after, end, stop).await;
        self.checkpoint = Some(sweep.checkpoint);
        sweep
    }

    /// Sweep on a fixed interval until `shutdown` flips to true. A flip in
    /// the middle of a pass stops it between buckets.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> BatchReport {
        let stop = Arc::new(AtomicBool::new(false));
        let watcher = {
            let stop = stop.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
                stop.store(true, Ordering::SeqCst);
            })
        };

        let mut interval = tokio::time::interval(Duration::from_secs(self.settings.sweep_interval_secs.max(1)));
        let mut total = BatchReport::new();
        info!(interval_secs = self.settings.sweep_interval_secs, "sweep loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let sweep = self.pass(Utc::now().timestamp(), &stop).await;
            total += sweep.report;
        }

        watcher.abort();
        info!(report = %total, checkpoint = ?self.checkpoint, "sweep loop stopped");
        total
    }
}
