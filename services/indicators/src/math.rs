//! Window calculators
//!
//! Streaming calculators fed oldest first. Each yields a value only once it
//! holds a full window.

use std::collections::VecDeque;

/// Simple Moving Average
#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    /// Add a value and return the current mean once the window is full
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.current()
    }

    pub fn current(&self) -> Option<f64> {
        if self.period > 0 && self.values.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.values.len() == self.period
    }
}

/// Population standard deviation over a sliding window
#[derive(Debug, Clone)]
pub struct Volatility {
    period: usize,
    values: VecDeque<f64>,
}

impl Volatility {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }

        if self.period > 0 && self.values.len() == self.period {
            Some(self.std_dev())
        } else {
            None
        }
    }

    fn std_dev(&self) -> f64 {
        let n = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / n;
        let variance = self
            .values
            .iter()
            .map(|x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        variance.sqrt()
    }
}

/// Wilder-smoothed Relative Strength Index
///
/// Seeds the average gain/loss with the simple mean of the first `period`
/// changes, then smooths with `(prev * (period - 1) + current) / period`.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gains: f64,
    losses: f64,
    seen: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            gains: 0.0,
            losses: 0.0,
            seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = match self.prev_close.replace(close) {
            Some(prev) => prev,
            None => return None,
        };
        if self.period == 0 {
            return None;
        }

        let change = close - prev;
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        self.seen += 1;

        if self.seen < self.period {
            self.gains += gain;
            self.losses += loss;
            return None;
        }

        let p = self.period as f64;
        if self.seen == self.period {
            self.avg_gain = (self.gains + gain) / p;
            self.avg_loss = (self.losses + loss) / p;
        } else {
            self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
            self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
        }
        Some(self.value())
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            if self.avg_gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            let rs = self.avg_gain / self.avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        }
    }
}

/// Mean of a whole window
pub fn mean(values: &[f64]) -> Option<f64> {
    let mut ma = MovingAverage::new(values.len());
    values.iter().fold(None, |_, v| ma.update(*v))
}

/// Population standard deviation of a whole window
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mut vol = Volatility::new(values.len());
    values.iter().fold(None, |_, v| vol.update(*v))
}

/// RSI at the last value of `closes`; needs at least `period + 1` closes
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    let mut rsi = Rsi::new(period);
    closes.iter().fold(None, |_, c| rsi.update(*c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_moving_average_window() {
        let mut ma = MovingAverage::new(3);
        assert_eq!(ma.update(1.0), None);
        assert_eq!(ma.update(2.0), None);
        assert_eq!(ma.update(3.0), Some(2.0));
        assert_eq!(ma.update(6.0), Some(11.0 / 3.0));
        assert!(ma.is_ready());
    }

    #[test]
    fn test_population_std_dev() {
        let std = std_dev(&[10.0, 11.0, 9.0, 12.0, 10.0]).unwrap();
        assert!((std - 1.04f64.sqrt()).abs() < 1e-12);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0], 3), None);
        assert_eq!(rsi(&[1.0, 2.0, 3.0, 4.0], 3), Some(100.0));
        assert_eq!(rsi(&[4.0, 3.0, 2.0, 1.0], 3), Some(0.0));
        assert_eq!(rsi(&[2.0, 2.0, 2.0, 2.0], 3), Some(50.0));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        // two gains of 1, two losses of 1
        let value = rsi(&[10.0, 11.0, 10.0, 11.0, 10.0], 4).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_wilder_smoothing() {
        // seed: gains 2, losses 0 over period 2 -> avg_gain 1, avg_loss 0
        // next: loss 1 -> avg_gain 0.5, avg_loss 0.5
        let value = rsi(&[10.0, 11.0, 12.0, 11.0], 2).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_rsi_bounded(closes in proptest::collection::vec(0.001f64..1000.0, 15..60)) {
            let value = rsi(&closes, 14).unwrap();
            prop_assert!((0.0..=100.0).contains(&value));
        }

        #[test]
        fn prop_mean_within_range(values in proptest::collection::vec(-1e6f64..1e6, 1..50)) {
            let m = mean(&values).unwrap();
            let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(m >= lo - 1e-6 && m <= hi + 1e-6);
        }
    }
}
