//! Williams %R indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// Williams %R.
///
/// %R = (Highest High - Close) / (Highest High - Lowest Low) * -100, range [-100, 0].
pub struct WilliamsR {
    period: usize,
}

impl Default for WilliamsR {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl WilliamsR {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for WilliamsR {
    type Output = f64;

    fn name(&self) -> &str {
        "WR"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if self.period == 0 || candles.len() < self.period {
            return None;
        }

        let window = &candles[candles.len() - self.period..];
        let highest_high = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let range = highest_high - lowest_low;

        if range == 0.0 {
            return Some(-50.0);
        }

        let close = window[window.len() - 1].close;
        Some((highest_high - close) / range * -100.0)
    }
}
