//! Rule table
//!
//! Elementary rules look at one condition of the current snapshot; logical
//! rules combine several and may also need the long snapshot.

use crate::elementary::{ElementaryEvents, LongEvents};
use std::fmt;
use types::Trend;

/// What a rule emits when it fires
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub event_value: f64,
    pub signal: &'static str,
    pub trend: Trend,
    pub strength_value: u8,
    pub strength_max: u8,
    pub rsi_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Some input is not available yet
    Pending,
    Suppressed,
    Fire(Firing),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    RsiOverboughtOversold,
    BbandBreakoutUp,
    BbandBreakoutDown,
    RsiCumulativeBullish,
    RsiCumulativeBearish,
    BenVolumeBasedBuy,
}

impl Rule {
    pub const ALL: [Rule; 6] = [
        Rule::RsiOverboughtOversold,
        Rule::BbandBreakoutUp,
        Rule::BbandBreakoutDown,
        Rule::RsiCumulativeBullish,
        Rule::RsiCumulativeBearish,
        Rule::BenVolumeBasedBuy,
    ];

    /// Event name; also the idempotency key component
    pub fn name(&self) -> &'static str {
        match self {
            Rule::RsiOverboughtOversold => "rsi_overbought_oversold",
            Rule::BbandBreakoutUp => "bband_breakout_up_signal",
            Rule::BbandBreakoutDown => "bband_breakout_down_signal",
            Rule::RsiCumulativeBullish => "RSI_Cumulative_bullish",
            Rule::RsiCumulativeBearish => "RSI_Cumulative_bearish",
            Rule::BenVolumeBasedBuy => "ben_volume_based_buy",
        }
    }

    pub fn is_logical(&self) -> bool {
        !matches!(self, Rule::RsiOverboughtOversold)
    }

    /// Whether the rule reads the long-period snapshot
    pub fn needs_long(&self) -> bool {
        matches!(self, Rule::RsiCumulativeBullish | Rule::RsiCumulativeBearish)
    }

    pub fn evaluate(&self, events: &ElementaryEvents, long: Option<&LongEvents>) -> Evaluation {
        match self {
            Rule::RsiOverboughtOversold => {
                let Some(bracket) = events.rsi_bracket else {
                    return Evaluation::Pending;
                };
                if bracket == 0 {
                    return Evaluation::Suppressed;
                }
                // overbought is a sell
                Evaluation::Fire(Firing {
                    event_value: bracket as f64,
                    signal: "RSI",
                    trend: Trend::from_sign(-bracket),
                    strength_value: strength(bracket),
                    strength_max: 3,
                    rsi_value: events.rsi,
                })
            }
            Rule::BbandBreakoutUp => breakout(
                [
                    events.close_cross_above_upper_band,
                    events.sma_short_above_long,
                    events.volume_above_mean,
                ],
                Trend::Bullish,
            ),
            Rule::BbandBreakoutDown => breakout(
                [
                    events.close_cross_below_lower_band,
                    events.sma_short_below_long,
                    events.volume_above_mean,
                ],
                Trend::Bearish,
            ),
            Rule::RsiCumulativeBullish => {
                rsi_cumulative(events, long.map(|l| l.sma_short_above_long), &[-2, -3], Trend::Bullish)
            }
            Rule::RsiCumulativeBearish => {
                rsi_cumulative(events, long.map(|l| l.sma_short_below_long), &[2, 3], Trend::Bearish)
            }
            Rule::BenVolumeBasedBuy => {
                let price_led = all_known([events.vbi_price_gt_mean_by_percent, events.vbi_volume_cross_from_below]);
                let volume_led = all_known([events.vbi_volume_gt_mean_by_percent, events.vbi_price_cross_from_below]);
                let Some((price_led, volume_led)) = price_led.zip(volume_led) else {
                    return Evaluation::Pending;
                };
                fire_if(price_led || volume_led, || Firing {
                    event_value: 1.0,
                    signal: "VBI",
                    trend: Trend::Bullish,
                    strength_value: 3,
                    strength_max: 3,
                    rsi_value: None,
                })
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn strength(bracket: i64) -> u8 {
    bracket.unsigned_abs().min(3) as u8
}

fn fire_if(condition: bool, firing: impl FnOnce() -> Firing) -> Evaluation {
    if condition {
        Evaluation::Fire(firing())
    } else {
        Evaluation::Suppressed
    }
}

/// `None` if any condition is unknown
fn all_known<const N: usize>(conditions: [Option<bool>; N]) -> Option<bool> {
    conditions.into_iter().try_fold(true, |acc, c| c.map(|c| acc && c))
}

fn breakout(conditions: [Option<bool>; 3], trend: Trend) -> Evaluation {
    match all_known(conditions) {
        None => Evaluation::Pending,
        Some(fires) => fire_if(fires, || Firing {
            event_value: 1.0,
            signal: "BBands_breakout",
            trend,
            strength_value: 3,
            strength_max: 3,
            rsi_value: None,
        }),
    }
}

fn rsi_cumulative(events: &ElementaryEvents, long_trend: Option<bool>, brackets: &[i64], trend: Trend) -> Evaluation {
    let (Some(long_trend), Some(bracket), Some(rsi)) = (long_trend, events.rsi_bracket, events.rsi) else {
        return Evaluation::Pending;
    };
    fire_if(long_trend && brackets.contains(&bracket), || Firing {
        event_value: rsi,
        signal: "RSI_Cumulative",
        trend,
        strength_value: strength(bracket),
        strength_max: 3,
        rsi_value: Some(rsi),
    })
}
