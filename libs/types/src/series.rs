//! Series identity: storage kinds, ordered-set keys and typed coordinates

use crate::bucket::{ensure_aligned, Horizon, FIVE_MINUTES};
use crate::errors::{AlignmentError, TypesError};
use crate::partition::PartitionKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every kind of series the pipeline stores.
///
/// The storage class doubles as the bus channel name: saving into a kind
/// publishes on the channel of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeriesKind {
    /// Raw collector ticks, one score per second, consumed by the resampler
    PriceVolumeHistory,
    /// Resampled 5-minute OHLC prices
    Price,
    /// Resampled 5-minute volume
    Volume,
    Sma,
    Rsi,
    Bbands,
    Vbi,
}

impl SeriesKind {
    pub const INDICATORS: [SeriesKind; 4] = [
        SeriesKind::Sma,
        SeriesKind::Rsi,
        SeriesKind::Bbands,
        SeriesKind::Vbi,
    ];

    pub fn storage_class(&self) -> &'static str {
        match self {
            SeriesKind::PriceVolumeHistory => "PriceVolumeHistoryStorage",
            SeriesKind::Price => "PriceStorage",
            SeriesKind::Volume => "VolumeStorage",
            SeriesKind::Sma => "SmaStorage",
            SeriesKind::Rsi => "RsiStorage",
            SeriesKind::Bbands => "BbandsStorage",
            SeriesKind::Vbi => "VbiStorage",
        }
    }

    /// Width every timestamp written to this kind must be divisible by
    pub fn bucket_width(&self) -> i64 {
        match self {
            SeriesKind::PriceVolumeHistory => 1,
            _ => FIVE_MINUTES,
        }
    }

    pub fn is_indicator(&self) -> bool {
        self.family().is_some()
    }

    /// Index prefix of the per-horizon sub-series, for indicator kinds
    pub fn family(&self) -> Option<&'static str> {
        match self {
            SeriesKind::Sma => Some("sma"),
            SeriesKind::Rsi => Some("rsi"),
            SeriesKind::Bbands => Some("bbands"),
            SeriesKind::Vbi => Some("vbi"),
            _ => None,
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_class())
    }
}

impl FromStr for SeriesKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "PriceVolumeHistoryStorage" => SeriesKind::PriceVolumeHistory,
            "PriceStorage" => SeriesKind::Price,
            "VolumeStorage" => SeriesKind::Volume,
            "SmaStorage" => SeriesKind::Sma,
            "RsiStorage" => SeriesKind::Rsi,
            "BbandsStorage" => SeriesKind::Bbands,
            "VbiStorage" => SeriesKind::Vbi,
            other => return Err(TypesError::UnknownStorageClass(other.to_string())),
        };
        Ok(kind)
    }
}

/// Identity of one ordered set: `{ticker}:{exchange}:{storage_class}:{index}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub partition: PartitionKey,
    pub kind: SeriesKind,
    pub index: String,
}

impl SeriesKey {
    pub fn new(partition: PartitionKey, kind: SeriesKind, index: impl Into<String>) -> Self {
        Self {
            partition,
            kind,
            index: index.into(),
        }
    }

    /// Sub-series of an indicator family at `horizon`
    pub fn for_horizon(partition: PartitionKey, kind: SeriesKind, horizon: Horizon) -> Result<Self, TypesError> {
        let family = kind.family().ok_or_else(|| {
            TypesError::InvalidCoordinates(format!("{} has no horizon sub-series", kind))
        })?;
        Ok(Self::new(partition, kind, horizon.index(family)))
    }

    pub fn bucket_width(&self) -> i64 {
        self.kind.bucket_width()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.partition, self.kind.storage_class(), self.index)
    }
}

/// Typed coordinates of one series entry, also the notification payload.
///
/// Unknown fields are rejected when decoding, so a producer cannot smuggle
/// loosely-typed attributes into key construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesCoordinates {
    pub ticker: String,
    pub exchange: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon: Option<Horizon>,
}

impl SeriesCoordinates {
    pub fn new(partition: &PartitionKey, timestamp: i64) -> Self {
        Self {
            ticker: partition.ticker.clone(),
            exchange: partition.exchange.clone(),
            timestamp,
            index: None,
            horizon: None,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_horizon(mut self, horizon: Horizon) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(self.ticker.clone(), self.exchange.clone())
    }

    pub fn validate_for(&self, kind: SeriesKind) -> Result<(), AlignmentError> {
        ensure_aligned(self.timestamp, kind.bucket_width())
    }

    /// Resolve the ordered-set key these coordinates address within `kind`.
    ///
    /// An explicit index wins; otherwise indicator kinds derive it from the horizon.
    pub fn series_key(&self, kind: SeriesKind) -> Result<SeriesKey, TypesError> {
        self.validate_for(kind)?;
        match (&self.index, self.horizon) {
            (Some(index), _) => Ok(SeriesKey::new(self.partition(), kind, index.clone())),
            (None, Some(horizon)) => SeriesKey::for_horizon(self.partition(), kind, horizon),
            (None, None) => Err(TypesError::InvalidCoordinates(
                "either index or horizon is required".to_string(),
            )),
        }
    }

    pub fn to_payload(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(|e| TypesError::InvalidCoordinates(e.to_string()))
    }

    pub fn from_payload(payload: &str) -> Result<Self, TypesError> {
        serde_json::from_str(payload).map_err(|e| TypesError::InvalidCoordinates(e.to_string()))
    }
}
