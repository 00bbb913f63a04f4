//! Simple Moving Average (SMA) indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// SMA (Simple Moving Average) of the last `period` closes.
pub struct Sma {
    period: usize,
}

impl Default for Sma {
    fn default() -> Self {
        Self { period: 50 }
    }
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn name(&self) -> &str {
        "SMA"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if self.period == 0 || candles.len() < self.period {
            return None;
        }

        let sum: f64 = candles
            .iter()
            .rev()
            .take(self.period)
            .map(|c| c.close)
            .sum();
        Some(sum / self.period as f64)
    }
}
