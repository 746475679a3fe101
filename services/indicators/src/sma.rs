//! Simple moving average of closes

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::math;
use crate::window::PriceWindow;
use async_trait::async_trait;
use types::{Horizon, PartitionKey, SeriesKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct Sma;

#[async_trait]
impl Indicator for Sma {
    type Value = f64;

    fn kind(&self) -> SeriesKind {
        SeriesKind::Sma
    }

    fn upstream(&self) -> &[SeriesKind] {
        &[SeriesKind::Price]
    }

    async fn compute(
        &self,
        window: &PriceWindow,
        partition: &PartitionKey,
        timestamp: i64,
        horizon: Horizon,
    ) -> Result<f64, IndicatorError> {
        let closes = window.closes(partition, timestamp, horizon.periods()).await?;
        math::mean(&closes).ok_or(IndicatorError::MissingData {
            needed: horizon.periods(),
            available: closes.len(),
        })
    }
}
