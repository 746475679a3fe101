//! # Indicators
//!
//! One bus subscriber per indicator family. On every resampled close (or
//! volume, for VBI) the subscriber recomputes each configured horizon over
//! the most recent buckets, saves the value and publishes it on the family's
//! channel.
//!
//! | Family | Stored as | Window |
//! |---|---|---|
//! | [`Sma`] | mean | `h` closes |
//! | [`Rsi`] | Wilder RSI | `max(h, rsi_min_period) + 1` closes |
//! | [`BollingerBands`] | `upper:middle:lower` | `h` closes |
//! | [`VolumeBased`] | `price:price_mean:volume:volume_mean` | `h` closes and volumes |
//!
//! Horizons without enough history are skipped for that bucket.

pub mod bbands;
pub mod error;
pub mod indicator;
pub mod math;
pub mod rsi;
pub mod sma;
pub mod values;
pub mod vbi;
pub mod window;

pub use bbands::{BollingerBands, SQUEEZE_SIGNAL};
pub use error::IndicatorError;
pub use indicator::{Indicator, IndicatorSubscriber};
pub use rsi::Rsi;
pub use sma::Sma;
pub use values::{Bands, Vbi};
pub use vbi::VolumeBased;
pub use window::PriceWindow;

use pubsub::{PubSub, Subscriber};
use settings::IndicatorSettings;
use std::sync::Arc;
use storage::{OrderedStore, SignalRepository, StoreResult};

/// Every indicator subscriber configured from `settings`, in the order a
/// rescan replays them.
pub fn subscribers(
    settings: &IndicatorSettings,
    store: Arc<dyn OrderedStore>,
    bus: PubSub,
    signals: Arc<dyn SignalRepository>,
) -> StoreResult<Vec<Arc<dyn Subscriber>>> {
    let horizons = settings.horizons.clone();
    let subscribers: Vec<Arc<dyn Subscriber>> = vec![
        Arc::new(IndicatorSubscriber::new(Sma, store.clone(), bus.clone(), horizons.clone())?),
        Arc::new(IndicatorSubscriber::new(
            Rsi::new(settings.rsi_min_period),
            store.clone(),
            bus.clone(),
            horizons.clone(),
        )?),
        Arc::new(
            IndicatorSubscriber::new(
                BollingerBands::new(settings.bbands_nbdev, settings.squeeze_threshold_pct),
                store.clone(),
                bus.clone(),
                horizons.clone(),
            )?
            .with_signals(signals),
        ),
        Arc::new(IndicatorSubscriber::new(VolumeBased, store, bus, horizons)?),
    ];
    Ok(subscribers)
}
