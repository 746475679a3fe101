//! Market data: raw collector ticks and resampled OHLCV buckets

use crate::errors::TypesError;
use crate::partition::PartitionKey;
use crate::series::SeriesKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sub-streams recorded per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceIndex {
    OpenPrice,
    HighPrice,
    LowPrice,
    ClosePrice,
    CloseVolume,
}

impl PriceIndex {
    /// Write order within one tick or bucket. `ClosePrice` is last: its write
    /// marks the bucket complete.
    pub const WRITE_ORDER: [PriceIndex; 5] = [
        PriceIndex::CloseVolume,
        PriceIndex::OpenPrice,
        PriceIndex::HighPrice,
        PriceIndex::LowPrice,
        PriceIndex::ClosePrice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceIndex::OpenPrice => "open_price",
            PriceIndex::HighPrice => "high_price",
            PriceIndex::LowPrice => "low_price",
            PriceIndex::ClosePrice => "close_price",
            PriceIndex::CloseVolume => "close_volume",
        }
    }

    /// Resampled kind this index lands in
    pub fn resampled_kind(&self) -> SeriesKind {
        match self {
            PriceIndex::CloseVolume => SeriesKind::Volume,
            _ => SeriesKind::Price,
        }
    }

    pub fn is_price(&self) -> bool {
        !matches!(self, PriceIndex::CloseVolume)
    }
}

impl fmt::Display for PriceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceIndex {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_price" => Ok(PriceIndex::OpenPrice),
            "high_price" => Ok(PriceIndex::HighPrice),
            "low_price" => Ok(PriceIndex::LowPrice),
            "close_price" => Ok(PriceIndex::ClosePrice),
            "close_volume" => Ok(PriceIndex::CloseVolume),
            other => Err(TypesError::UnknownIndex(other.to_string())),
        }
    }
}

/// One collector observation for a partition. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub partition: PartitionKey,
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceTick {
    pub fn new(partition: PartitionKey, timestamp: i64) -> Self {
        Self {
            partition,
            timestamp,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    /// Present, strictly positive fields in [`PriceIndex::WRITE_ORDER`].
    pub fn fields(&self) -> Vec<(PriceIndex, f64)> {
        PriceIndex::WRITE_ORDER
            .iter()
            .filter_map(|index| {
                let value = match index {
                    PriceIndex::OpenPrice => self.open,
                    PriceIndex::HighPrice => self.high,
                    PriceIndex::LowPrice => self.low,
                    PriceIndex::ClosePrice => self.close,
                    PriceIndex::CloseVolume => self.volume,
                }?;
                (value.is_finite() && value > 0.0).then_some((*index, value))
            })
            .collect()
    }
}

/// Resampled 5-minute bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    /// Bucket start, divisible by 300
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Ohlcv {
    pub fn value(&self, index: PriceIndex) -> f64 {
        match index {
            PriceIndex::OpenPrice => self.open,
            PriceIndex::HighPrice => self.high,
            PriceIndex::LowPrice => self.low,
            PriceIndex::ClosePrice => self.close,
            PriceIndex::CloseVolume => self.volume,
        }
    }
}
