//! Tracing setup for the pipeline binary

use anyhow::{Context, Result};
use settings::LogSettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `log.filter`.
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter)
            .with_context(|| format!("invalid log filter {:?}", settings.filter))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
    .context("Failed to install tracing subscriber")
}
