//! Tick and partition fixtures

use types::{PartitionKey, PriceTick, FIVE_MINUTES};

pub fn eth_btc() -> PartitionKey {
    PartitionKey::new("ETH_BTC", "BITTREX")
}

/// Full OHLCV tick at `timestamp`
pub fn ohlcv_tick(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> PriceTick {
    PriceTick {
        partition: eth_btc(),
        timestamp,
        open: Some(open),
        high: Some(high),
        low: Some(low),
        close: Some(close),
        volume: Some(volume),
    }
}

/// Close and volume in the last minute of bucket `score`, so the close
/// alone completes the bucket
pub fn closing_tick(score: i64, close: f64, volume: f64) -> PriceTick {
    let mut tick = PriceTick::new(eth_btc(), score * FIVE_MINUTES + FIVE_MINUTES - 30);
    tick.close = Some(close);
    tick.volume = Some(volume);
    tick
}

/// Raw-series key of `index` for [`eth_btc`]
pub fn raw_key(index: &str) -> String {
    format!("ETH_BTC:BITTREX:PriceVolumeHistoryStorage:{}", index)
}

pub fn series_key(storage_class: &str, index: &str) -> String {
    format!("ETH_BTC:BITTREX:{}:{}", storage_class, index)
}
