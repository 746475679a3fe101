//! # TA Pipeline Settings
//!
//! Configuration for every pipeline component, loaded in three layers:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. An optional TOML file (`config/pipeline.toml` unless a path is given)
//! 3. Environment overrides with the `TA__` prefix, e.g.
//!    `TA__RESAMPLER__SWEEP_INTERVAL_SECS=30`
//!
//! ## Example
//!
//! ```toml
//! [[partitions]]
//! ticker = "ETH_BTC"
//! exchange = "BITTREX"
//!
//! [indicators]
//! horizons = [5, 25, 100]
//!
//! [events]
//! long_resample_width = 86400
//! ```
//!
//! Every section denies unknown keys so a typo fails at startup instead of
//! silently falling back to a default.

mod sections;

pub use sections::{
    BusSettings, EventSettings, IndicatorSettings, LogSettings, ResamplerSettings,
    RestoreSettings, RsiBrackets, StoreBackend, StoreSettings,
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use types::{PartitionKey, FIVE_MINUTES};

const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
const ENV_PREFIX: &str = "TA";

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    pub log: LogSettings,
    pub store: StoreSettings,
    pub bus: BusSettings,
    /// Partitions swept and rescanned by the pipeline process
    pub partitions: Vec<PartitionKey>,
    pub resampler: ResamplerSettings,
    pub indicators: IndicatorSettings,
    pub events: EventSettings,
    pub restore: RestoreSettings,
}

impl Settings {
    /// Load defaults, then `path` (or the default path if present), then `TA__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default())
            .context("Failed to serialize default settings")?;

        let mut builder = Config::builder().add_source(defaults);

        builder = match path {
            Some(path) => {
                info!("Loading settings from {:?}", path);
                builder.add_source(File::from(path).required(true))
            }
            None => {
                debug!("Looking for optional settings at {}", DEFAULT_CONFIG_PATH);
                builder.add_source(File::with_name(DEFAULT_CONFIG_PATH).required(false))
            }
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Failed to deserialize settings")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.indicators.horizons.is_empty() {
            bail!("indicators.horizons must not be empty");
        }
        if self.indicators.horizons.iter().any(|h| h.0 == 0) {
            bail!("indicators.horizons must be positive");
        }
        for (name, horizon) in [
            ("events.evaluation_horizon", self.events.evaluation_horizon),
            ("events.short_sma_horizon", self.events.short_sma_horizon),
            ("events.long_sma_horizon", self.events.long_sma_horizon),
        ] {
            if !self.indicators.horizons.contains(&horizon) {
                bail!("{} = {} is not one of indicators.horizons", name, horizon.0);
            }
        }
        if self.events.short_sma_horizon >= self.events.long_sma_horizon {
            bail!("events.short_sma_horizon must be shorter than events.long_sma_horizon");
        }
        if self.events.long_resample_width <= 0 || self.events.long_resample_width % FIVE_MINUTES != 0 {
            bail!(
                "events.long_resample_width must be a positive multiple of {}",
                FIVE_MINUTES
            );
        }
        if self.bus.subscription_capacity == 0 {
            bail!("bus.subscription_capacity must be positive");
        }
        if self.restore.workers == 0 {
            bail!("restore.workers must be positive");
        }
        if self.resampler.lag_buckets < 1 {
            bail!("resampler.lag_buckets must be at least 1");
        }
        if self.resampler.lookback_buckets < 1 {
            bail!("resampler.lookback_buckets must be at least 1");
        }
        self.events.rsi_brackets.validate()?;
        Ok(())
    }
}
