//! Single-indicator conditions derived from a snapshot
//!
//! A condition whose inputs are missing is `None`; rules that depend on it
//! stay pending.

use crate::snapshot::{LongSnapshot, Snapshot};
use indicators::Vbi;
use settings::EventSettings;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementaryEvents {
    pub close_cross_above_upper_band: Option<bool>,
    pub close_cross_below_lower_band: Option<bool>,
    pub sma_short_above_long: Option<bool>,
    pub sma_short_below_long: Option<bool>,
    /// `-3..=3`, 0 between the oversold and overbought levels
    pub rsi_bracket: Option<i64>,
    pub rsi: Option<f64>,
    pub volume_above_mean: Option<bool>,
    pub vbi_price_gt_mean_by_percent: Option<bool>,
    pub vbi_volume_gt_mean_by_percent: Option<bool>,
    pub vbi_price_cross_from_below: Option<bool>,
    pub vbi_volume_cross_from_below: Option<bool>,
}

impl ElementaryEvents {
    pub fn detect(snapshot: &Snapshot, settings: &EventSettings) -> Self {
        let crossed_up = snapshot
            .prev_close
            .zip(snapshot.prev_bands)
            .zip(snapshot.close.zip(snapshot.bands))
            .map(|((prev, prev_bands), (close, bands))| prev <= prev_bands.upper && close > bands.upper);
        let crossed_down = snapshot
            .prev_close
            .zip(snapshot.prev_bands)
            .zip(snapshot.close.zip(snapshot.bands))
            .map(|((prev, prev_bands), (close, bands))| prev >= prev_bands.lower && close < bands.lower);
        let sma = snapshot.sma_short.zip(snapshot.sma_long);

        let factor = 1.0 + settings.vbi_percent / 100.0;
        let vbi = snapshot.vbi;
        let vbi_pair = snapshot.prev_vbi.zip(snapshot.vbi);

        Self {
            close_cross_above_upper_band: crossed_up,
            close_cross_below_lower_band: crossed_down,
            sma_short_above_long: sma.map(|(short, long)| short > long),
            sma_short_below_long: sma.map(|(short, long)| short < long),
            rsi_bracket: snapshot.rsi.map(|rsi| settings.rsi_brackets.bracket(rsi)),
            rsi: snapshot.rsi,
            volume_above_mean: vbi.map(|v| v.volume > v.volume_mean),
            vbi_price_gt_mean_by_percent: vbi.map(|v| v.price > v.price_mean * factor),
            vbi_volume_gt_mean_by_percent: vbi.map(|v| v.volume > v.volume_mean * factor),
            vbi_price_cross_from_below: vbi_pair.map(|(prev, cur)| crossed_from_below(prev, cur, |v| (v.price, v.price_mean))),
            vbi_volume_cross_from_below: vbi_pair
                .map(|(prev, cur)| crossed_from_below(prev, cur, |v| (v.volume, v.volume_mean))),
        }
    }
}

fn crossed_from_below(prev: Vbi, cur: Vbi, pick: impl Fn(&Vbi) -> (f64, f64)) -> bool {
    let (prev_value, prev_mean) = pick(&prev);
    let (value, mean) = pick(&cur);
    prev_value <= prev_mean && value > mean
}

/// Trend conditions of the long snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongEvents {
    pub sma_short_above_long: bool,
    pub sma_short_below_long: bool,
}

impl LongEvents {
    pub fn detect(long: &LongSnapshot) -> Self {
        Self {
            sma_short_above_long: long.sma_short > long.sma_long,
            sma_short_below_long: long.sma_short < long.sma_long,
        }
    }
}
