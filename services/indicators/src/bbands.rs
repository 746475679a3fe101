//! Bollinger Bands with squeeze detection

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::math;
use crate::values::Bands;
use crate::window::PriceWindow;
use async_trait::async_trait;
use storage::IndicatorEntry;
use types::{Horizon, PartitionKey, SeriesKind, Signal, Trend};

pub const SQUEEZE_SIGNAL: &str = "BBands_squeeze";

/// Middle band is the mean of the last `horizon` closes; outer bands sit
/// `nbdev` population standard deviations away.
#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    nbdev: f64,
    /// Percent of the middle band, compared with [`Bands::squeeze_pct`]
    squeeze_threshold_pct: f64,
}

impl BollingerBands {
    pub fn new(nbdev: f64, squeeze_threshold_pct: f64) -> Self {
        Self {
            nbdev,
            squeeze_threshold_pct,
        }
    }

    pub fn bands(&self, closes: &[f64]) -> Option<Bands> {
        let middle = math::mean(closes)?;
        let std = math::std_dev(closes)?;
        Some(Bands {
            upper: middle + self.nbdev * std,
            middle,
            lower: middle - self.nbdev * std,
        })
    }
}

#[async_trait]
impl Indicator for BollingerBands {
    type Value = Bands;

    fn kind(&self) -> SeriesKind {
        SeriesKind::Bbands
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
    ) -> Result<Bands, IndicatorError> {
        let closes = window.closes(partition, timestamp, horizon.periods()).await?;
        self.bands(&closes).ok_or(IndicatorError::MissingData {
            needed: horizon.periods(),
            available: closes.len(),
        })
    }

    fn signal(&self, entry: &IndicatorEntry<Bands>) -> Option<Signal> {
        let squeeze = entry.value.squeeze_pct()?;
        if squeeze >= self.squeeze_threshold_pct {
            return None;
        }
        Some(Signal {
            partition: entry.partition.clone(),
            timestamp: entry.timestamp,
            horizon: entry.horizon,
            signal: SQUEEZE_SIGNAL.to_string(),
            source: format!("bbands_squeeze_{}", entry.horizon.0),
            trend: Trend::Bullish,
            strength_value: 1,
            strength_max: 3,
            rsi_value: None,
            squeeze: Some(squeeze),
        })
    }
}
