//! Event and signal records produced by rule evaluation
//!
//! Both records are immutable once written. `RuleKey` is the idempotency key:
//! one firing per `(partition, bucket, rule)`.

use crate::bucket::Horizon;
use crate::partition::PartitionKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a signal. Positive is bullish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Bearish,
    Neutral,
    Bullish,
}

impl Trend {
    pub fn from_sign(value: i64) -> Self {
        match value.signum() {
            1 => Trend::Bullish,
            -1 => Trend::Bearish,
            _ => Trend::Neutral,
        }
    }

    pub fn as_i8(&self) -> i8 {
        match self {
            Trend::Bearish => -1,
            Trend::Neutral => 0,
            Trend::Bullish => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub partition: PartitionKey,
    pub timestamp: i64,
    pub name: String,
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.partition, self.timestamp, self.name)
    }
}

/// Raw rule firing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub partition: PartitionKey,
    pub timestamp: i64,
    pub horizon: Horizon,
    pub event_name: String,
    pub event_value: f64,
}

impl Event {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            partition: self.partition.clone(),
            timestamp: self.timestamp,
            name: self.event_name.clone(),
        }
    }
}

/// Directional recommendation consumed by delivery channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub partition: PartitionKey,
    pub timestamp: i64,
    pub horizon: Horizon,
    /// Signal family, e.g. `RSI_Cumulative`
    pub signal: String,
    /// Rule or indicator that raised it; part of the idempotency key
    pub source: String,
    pub trend: Trend,
    pub strength_value: u8,
    pub strength_max: u8,
    pub rsi_value: Option<f64>,
    pub squeeze: Option<f64>,
}

impl Signal {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            partition: self.partition.clone(),
            timestamp: self.timestamp,
            name: self.source.clone(),
        }
    }
}
