//! Aggregation of one bucket's raw ticks

use std::collections::BTreeMap;
use types::{Ohlcv, PriceIndex};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BucketState {
    /// No raw ticks at all
    Empty,
    /// Some ticks, but no close yet
    Pending,
    Complete(Ohlcv),
}

/// Raw values recorded inside one 5-minute bucket, per index, in timestamp order.
#[derive(Debug, Clone, Default)]
pub struct RawBucket {
    pub timestamp: i64,
    values: BTreeMap<PriceIndex, Vec<(i64, f64)>>,
}

impl RawBucket {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, index: PriceIndex, timestamp: i64, value: f64) {
        let values = self.values.entry(index).or_default();
        values.push((timestamp, value));
        values.sort_by_key(|(ts, _)| *ts);
    }

    pub fn values(&self, index: PriceIndex) -> impl Iterator<Item = f64> + '_ {
        self.values
            .get(&index)
            .into_iter()
            .flat_map(|values| values.iter().map(|(_, v)| *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.is_empty())
    }

    /// Fold the raw values into one OHLCV record once a close is present.
    ///
    /// Closes take part in the high and low so a bucket with only closes
    /// still yields a consistent candle.
    pub fn aggregate(&self) -> BucketState {
        let closes: Vec<f64> = self.values(PriceIndex::ClosePrice).collect();
        let (Some(&first_close), Some(&close)) = (closes.first(), closes.last()) else {
            return if self.is_empty() {
                BucketState::Empty
            } else {
                BucketState::Pending
            };
        };

        let open = self.values(PriceIndex::OpenPrice).next().unwrap_or(first_close);
        let high = self
            .values(PriceIndex::HighPrice)
            .chain(closes.iter().copied())
            .fold(f64::MIN, f64::max);
        let low = self
            .values(PriceIndex::LowPrice)
            .chain(closes.iter().copied())
            .fold(f64::MAX, f64::min);
        let volume = self.values(PriceIndex::CloseVolume).sum();

        BucketState::Complete(Ohlcv {
            timestamp: self.timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Fold late raw values into a bucket that was already committed.
    ///
    /// The committed open stays, high and low only widen, the last raw close
    /// replaces the committed one and volumes add up.
    pub fn fold_into(&self, committed: Ohlcv) -> Ohlcv {
        let closes: Vec<f64> = self.values(PriceIndex::ClosePrice).collect();
        let high = self
            .values(PriceIndex::HighPrice)
            .chain(closes.iter().copied())
            .fold(committed.high, f64::max);
        let low = self
            .values(PriceIndex::LowPrice)
            .chain(closes.iter().copied())
            .fold(committed.low, f64::min);

        Ohlcv {
            timestamp: committed.timestamp,
            open: committed.open,
            high,
            low,
            close: closes.last().copied().unwrap_or(committed.close),
            volume: committed.volume + self.values(PriceIndex::CloseVolume).sum::<f64>(),
        }
    }
}
