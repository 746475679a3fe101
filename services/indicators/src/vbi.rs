//! Volume-based indicator

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::math;
use crate::values::Vbi;
use crate::window::PriceWindow;
use async_trait::async_trait;
use types::{Horizon, PartitionKey, SeriesKind};

/// Last close and volume next to their `horizon`-period means.
///
/// Triggered by volume notifications, which the resampler publishes after
/// the matching close is committed.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeBased;

#[async_trait]
impl Indicator for VolumeBased {
    type Value = Vbi;

    fn kind(&self) -> SeriesKind {
        SeriesKind::Vbi
    }

    fn upstream(&self) -> &[SeriesKind] {
        &[SeriesKind::Volume]
    }

    async fn compute(
        &self,
        window: &PriceWindow,
        partition: &PartitionKey,
        timestamp: i64,
        horizon: Horizon,
    ) -> Result<Vbi, IndicatorError> {
        let count = horizon.periods();
        let closes = window.closes(partition, timestamp, count).await?;
        let volumes = window.volumes(partition, timestamp, count).await?;

        let missing = IndicatorError::MissingData {
            needed: count,
            available: closes.len().min(volumes.len()),
        };
        match (closes.last(), math::mean(&closes), volumes.last(), math::mean(&volumes)) {
            (Some(&price), Some(price_mean), Some(&volume), Some(volume_mean)) => Ok(Vbi {
                price,
                price_mean,
                volume,
                volume_mean,
            }),
            _ => Err(missing),
        }
    }
}
