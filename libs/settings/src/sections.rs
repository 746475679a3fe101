//! Configuration sections

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use types::{Horizon, DAY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Extra attempts for a pipeline that hit an unavailable store
    pub pipeline_retries: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            pipeline_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BusSettings {
    /// Messages buffered per subscription before new ones are dropped
    pub subscription_capacity: usize,
    /// Sleep between polls when a subscriber has nothing pending
    pub idle_poll_ms: u64,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            subscription_capacity: 1024,
            idle_poll_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResamplerSettings {
    pub sweep_interval_secs: u64,
    /// Buckets behind the current one the sweep ceiling stays; at least 1
    pub lag_buckets: i64,
    /// First score of the very first sweep; 0 derives it from `lookback_buckets`
    pub start_score: i64,
    pub lookback_buckets: i64,
}

impl Default for ResamplerSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            lag_buckets: 1,
            start_score: 0,
            lookback_buckets: 288,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IndicatorSettings {
    pub horizons: Vec<Horizon>,
    /// Lower bound on the RSI lookback regardless of horizon
    pub rsi_min_period: usize,
    /// Band width in standard deviations
    pub bbands_nbdev: f64,
    /// Squeeze threshold in percent of the middle band: `(upper - lower) / middle * 100`
    pub squeeze_threshold_pct: f64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            horizons: vec![Horizon(5), Horizon(25), Horizon(100)],
            rsi_min_period: 14,
            bbands_nbdev: 2.0,
            squeeze_threshold_pct: 2.0,
        }
    }
}

/// RSI thresholds mapped to brackets 1..=3 (overbought) and -1..=-3 (oversold)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RsiBrackets {
    /// Ascending, e.g. `[70, 75, 80]`
    pub overbought: [f64; 3],
    /// Descending, e.g. `[30, 25, 20]`
    pub oversold: [f64; 3],
}

impl Default for RsiBrackets {
    fn default() -> Self {
        Self {
            overbought: [70.0, 75.0, 80.0],
            oversold: [30.0, 25.0, 20.0],
        }
    }
}

impl RsiBrackets {
    /// Bracket of `rsi` in `-3..=3`; 0 is the neutral band.
    pub fn bracket(&self, rsi: f64) -> i64 {
        if let Some(level) = self.overbought.iter().rposition(|threshold| rsi >= *threshold) {
            return level as i64 + 1;
        }
        if let Some(level) = self.oversold.iter().rposition(|threshold| rsi <= *threshold) {
            return -(level as i64 + 1);
        }
        0
    }

    pub fn validate(&self) -> Result<()> {
        if !self.overbought.windows(2).all(|w| w[0] < w[1]) {
            bail!("events.rsi_brackets.overbought must be strictly ascending");
        }
        if !self.oversold.windows(2).all(|w| w[0] > w[1]) {
            bail!("events.rsi_brackets.oversold must be strictly descending");
        }
        if self.oversold[0] >= self.overbought[0] {
            bail!("events.rsi_brackets oversold and overbought ranges overlap");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EventSettings {
    /// Horizon whose band, RSI and VBI values feed the elementary events
    pub evaluation_horizon: Horizon,
    pub short_sma_horizon: Horizon,
    pub long_sma_horizon: Horizon,
    /// Width of the long snapshot used by cross-horizon rules
    pub long_resample_width: i64,
    pub rsi_brackets: RsiBrackets,
    /// Percent above the mean that counts as "greater than mean" for VBI events
    pub vbi_percent: f64,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            evaluation_horizon: Horizon(5),
            short_sma_horizon: Horizon(25),
            long_sma_horizon: Horizon(100),
            long_resample_width: DAY,
            rsi_brackets: RsiBrackets::default(),
            vbi_percent: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RestoreSettings {
    /// Transaction currencies restored; rows of any other currency are skipped
    /// whatever their counter currency
    pub transaction_currencies: Vec<String>,
    /// Ticks saved concurrently
    pub workers: usize,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        let transaction_currencies = [
            "XVG", "IOTX", "LTC", "YOYOW", "STR", "TRX", "ADA", "CDT", "VET", "KEY", "HOT", "AGI", "XMR",
            "LEND", "DENT", "NPXS", "ZIL", "XRP", "IOST", "EOS", "VRC", "ETH", "ETC", "NCASH", "AST", "RPX",
            "VIB", "ZRX", "DGB", "BTC", "SC", "MFT", "GTO", "XEM", "DASH", "DOGE", "XLM", "FCT", "BAT", "QKC",
            "POE", "ENJ", "FUN", "STRAT", "ICX", "BCN", "TNB", "CHAT", "DOCK", "REQ", "IOTA", "STORM", "TNT",
            "SNT", "FUEL", "BCH", "LSK", "OMG", "BTS", "WPR", "ZEC", "GAME", "MTH", "OST", "RCN", "REP",
        ];
        Self {
            transaction_currencies: transaction_currencies.iter().map(|c| c.to_string()).collect(),
            workers: 8,
        }
    }
}

impl RestoreSettings {
    pub fn accepts(&self, transaction: &str) -> bool {
        self.transaction_currencies.iter().any(|c| c == transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_brackets() {
        let brackets = RsiBrackets::default();
        assert_eq!(brackets.bracket(50.0), 0);
        assert_eq!(brackets.bracket(71.0), 1);
        assert_eq!(brackets.bracket(76.0), 2);
        assert_eq!(brackets.bracket(85.0), 3);
        assert_eq!(brackets.bracket(29.0), -1);
        assert_eq!(brackets.bracket(24.0), -2);
        assert_eq!(brackets.bracket(10.0), -3);
        brackets.validate().unwrap();
    }

    #[test]
    fn test_restore_whitelist() {
        let restore = RestoreSettings::default();
        assert!(restore.accepts("ETH"));
        assert!(restore.accepts("BTC"));
        assert!(!restore.accepts("PEPE"));
    }
}
