//! Resample on saved closes

use crate::resampler::{ResampleOutcome, Resampler};
use anyhow::Context;
use async_trait::async_trait;
use pubsub::Subscriber;
use std::sync::Arc;
use tracing::debug;
use types::{score_from_timestamp, PriceIndex, SeriesCoordinates, SeriesKind, FIVE_MINUTES};

/// Seconds before the end of a bucket in which a close also resamples the
/// bucket it belongs to
const LAST_MINUTE: i64 = 60;

/// Listens on the raw history channel. A saved close at `t` resamples the
/// previous bucket, which is closed by then, and the current bucket when `t`
/// falls in its last minute.
pub struct HistoryResampleSubscriber {
    resampler: Arc<Resampler>,
}

impl HistoryResampleSubscriber {
    pub fn new(resampler: Arc<Resampler>) -> Self {
        Self { resampler }
    }
}

#[async_trait]
impl Subscriber for HistoryResampleSubscriber {
    fn name(&self) -> &str {
        "history_resample"
    }

    fn channels(&self) -> &[SeriesKind] {
        &[SeriesKind::PriceVolumeHistory]
    }

    async fn handle(&self, _channel: SeriesKind, coords: &SeriesCoordinates) -> anyhow::Result<()> {
        if coords.index.as_deref() != Some(PriceIndex::ClosePrice.as_str()) {
            return Ok(());
        }

        let partition = coords.partition();
        let current = score_from_timestamp(coords.timestamp, FIVE_MINUTES);
        let mut scores = vec![current - 1];
        if coords.timestamp.rem_euclid(FIVE_MINUTES) >= FIVE_MINUTES - LAST_MINUTE {
            scores.push(current);
        }

        for score in scores {
            let outcome = self
                .resampler
                .resample(&partition, score)
                .await
                .with_context(|| format!("resampling {} at score {}", partition, score))?;
            if outcome != ResampleOutcome::Empty {
                debug!(partition = %partition, score, ?outcome, "resample triggered by close");
            }
        }
        Ok(())
    }
}
