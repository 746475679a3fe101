//! Partition key: the `(ticker, exchange)` pair every series is sharded by

use crate::errors::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionKey {
    /// `TRANSACTION_COUNTER`, e.g. `ETH_BTC`
    pub ticker: String,
    /// Source exchange, e.g. `BITTREX`
    pub exchange: String,
}

impl PartitionKey {
    pub fn new(ticker: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            exchange: exchange.into(),
        }
    }

    /// Split the ticker into `(transaction_currency, counter_currency)`.
    pub fn currencies(&self) -> Option<(&str, &str)> {
        self.ticker.split_once('_')
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ticker, self.exchange)
    }
}

impl FromStr for PartitionKey {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypesError::InvalidPartition {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (ticker, exchange) = s.split_once(':').ok_or_else(|| invalid("expected ticker:exchange"))?;
        if ticker.is_empty() || exchange.is_empty() {
            return Err(invalid("empty component"));
        }
        if exchange.contains(':') {
            return Err(invalid("too many components"));
        }
        Ok(Self::new(ticker, exchange))
    }
}
