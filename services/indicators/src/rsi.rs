//! Relative strength index of closes

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::math;
use crate::window::PriceWindow;
use async_trait::async_trait;
use types::{Horizon, PartitionKey, SeriesKind};

/// Wilder RSI with a lookback of `max(horizon, min_period)` changes
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    min_period: usize,
}

impl Rsi {
    pub fn new(min_period: usize) -> Self {
        Self { min_period }
    }

    pub fn period(&self, horizon: Horizon) -> usize {
        horizon.periods().max(self.min_period)
    }
}

#[async_trait]
impl Indicator for Rsi {
    type Value = f64;

    fn kind(&self) -> SeriesKind {
        SeriesKind::Rsi
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
        let period = self.period(horizon);
        let closes = window.closes(partition, timestamp, period + 1).await?;
        math::rsi(&closes, period).ok_or(IndicatorError::MissingData {
            needed: period + 1,
            available: closes.len(),
        })
    }
}
