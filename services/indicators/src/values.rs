//! Composite indicator values and their stored text form

use storage::SeriesValue;

fn decode_parts<const N: usize>(raw: &str) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    let mut parts = raw.split(':');
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse::<f64>().ok().filter(|v| v.is_finite())?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Bollinger Bands, stored as `upper:middle:lower`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bands {
    /// Band width as a percentage of the middle band
    pub fn squeeze_pct(&self) -> Option<f64> {
        if self.middle == 0.0 {
            return None;
        }
        Some((self.upper - self.lower) / self.middle * 100.0)
    }
}

impl SeriesValue for Bands {
    fn encode(&self) -> String {
        format!("{}:{}:{}", self.upper, self.middle, self.lower)
    }

    fn decode(raw: &str) -> Option<Self> {
        let [upper, middle, lower] = decode_parts::<3>(raw)?;
        Some(Self { upper, middle, lower })
    }
}

/// Volume-based indicator: last close and volume against their means,
/// stored as `price:price_mean:volume:volume_mean`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vbi {
    pub price: f64,
    pub price_mean: f64,
    pub volume: f64,
    pub volume_mean: f64,
}

impl SeriesValue for Vbi {
    fn encode(&self) -> String {
        format!("{}:{}:{}:{}", self.price, self.price_mean, self.volume, self.volume_mean)
    }

    fn decode(raw: &str) -> Option<Self> {
        let [price, price_mean, volume, volume_mean] = decode_parts::<4>(raw)?;
        Some(Self {
            price,
            price_mean,
            volume,
            volume_mean,
        })
    }
}
