//! History restore from the relational price store
//!
//! Walks day by day, saves each day's raw rows into the tick history and then
//! sweeps that day's buckets for the partitions seen. Partitions are restored
//! concurrently; rows of one partition are saved in timestamp order.

use crate::history::PriceVolumeHistory;
use crate::resampler::Resampler;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use settings::RestoreSettings;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use types::{score_from_timestamp, BatchReport, PartitionKey, PriceTick, FIVE_MINUTES};

/// One row of historical prices as the relational store exposes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceHistoryRow {
    pub exchange: String,
    pub transaction_currency: String,
    pub counter_currency: String,
    pub timestamp: i64,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PriceHistoryRow {
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(
            format!("{}_{}", self.transaction_currency, self.counter_currency),
            self.exchange.clone(),
        )
    }

    pub fn to_tick(&self) -> PriceTick {
        PriceTick {
            partition: self.partition(),
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Read-only access to historical price rows
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Rows with `from <= timestamp < to`
    async fn rows(&self, from: i64, to: i64) -> Result<Vec<PriceHistoryRow>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub days: u64,
    /// Days whose rows could not be read
    pub failed_days: u64,
    pub ticks: BatchReport,
    pub buckets: BatchReport,
}

pub struct RestoreJob {
    history: PriceVolumeHistory,
    resampler: Arc<Resampler>,
    source: Arc<dyn PriceHistorySource>,
    settings: RestoreSettings,
}

fn day_start(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl RestoreJob {
    pub fn new(resampler: Arc<Resampler>, source: Arc<dyn PriceHistorySource>, settings: RestoreSettings) -> Self {
        Self {
            history: resampler.history().clone(),
            resampler,
            source,
            settings,
        }
    }

    /// Restore every day in `[from, to)`. `stop` is checked between days and,
    /// inside the resample sweep, between buckets.
    pub async fn run(&self, from: NaiveDate, to: NaiveDate, stop: &AtomicBool) -> Result<RestoreReport> {
        if from >= to {
            return Err(anyhow!("restore range {} .. {} is empty", from, to));
        }

        let mut report = RestoreReport::default();
        let mut day = from;
        while day < to {
            if stop.load(Ordering::SeqCst) {
                info!(%day, "restore stopped");
                break;
            }
            let next = day
                .succ_opt()
                .ok_or_else(|| anyhow!("no day after {}", day))?;

            self.restore_day(day_start(day), day_start(next), stop, &mut report).await;
            report.days += 1;
            day = next;
        }

        info!(
            days = report.days,
            failed_days = report.failed_days,
            ticks = %report.ticks,
            buckets = %report.buckets,
            "restore finished"
        );
        Ok(report)
    }

    async fn restore_day(&self, from: i64, to: i64, stop: &AtomicBool, report: &mut RestoreReport) {
        let rows = match self.source.rows(from, to).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(from, to, error = ?e, "failed to read price history");
                report.failed_days += 1;
                return;
            }
        };

        let mut by_partition: BTreeMap<PartitionKey, Vec<PriceTick>> = BTreeMap::new();
        for row in rows {
            if !self.settings.accepts(&row.transaction_currency) {
                report.ticks.record_skipped();
                continue;
            }
            by_partition.entry(row.partition()).or_default().push(row.to_tick());
        }

        let partitions: Vec<PartitionKey> = by_partition.keys().cloned().collect();
        let workers = self.settings.workers.max(1);
        let saved: Vec<BatchReport> = stream::iter(by_partition)
            .map(|(partition, ticks)| self.save_partition(partition, ticks))
            .buffer_unordered(workers)
            .collect()
            .await;
        for part in saved {
            report.ticks += part;
        }
        debug!(from, partitions = partitions.len(), ticks = %report.ticks, "day saved");

        let after = score_from_timestamp(from, FIVE_MINUTES) - 1;
        let end = score_from_timestamp(to, FIVE_MINUTES) - 1;
        let sweep = self.resampler.sweep(&partitions, after, end, stop).await;
        report.buckets += sweep.report;
    }

    async fn save_partition(&self, partition: PartitionKey, mut ticks: Vec<PriceTick>) -> BatchReport {
        ticks.sort_by_key(|tick| tick.timestamp);
        let mut report = BatchReport::new();
        for tick in &ticks {
            match self.history.save_tick(tick, false).await {
                Ok(0) => report.record_skipped(),
                Ok(_) => report.record_processed(),
                Err(e) => {
                    error!(
                        ticker = %partition.ticker,
                        exchange = %partition.exchange,
                        timestamp = tick.timestamp,
                        error = %e,
                        "failed to save tick"
                    );
                    report.record_failed();
                }
            }
        }
        report
    }
}
