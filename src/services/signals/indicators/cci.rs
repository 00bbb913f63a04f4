//! Commodity Channel Index (CCI) indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// CCI (Commodity Channel Index) indicator.
///
/// CCI = (TP - SMA(TP)) / (0.015 * Mean Deviation)
/// where TP = Typical Price = (High + Low + Close) / 3
pub struct Cci {
    period: usize,
}

impl Default for Cci {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl Cci {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    fn typical_price(candle: &OhlcPoint) -> f64 {
        (candle.high + candle.low + candle.close) / 3.0
    }
}

impl Indicator for Cci {
    type Output = f64;

    fn name(&self) -> &str {
        "CCI"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if self.period == 0 || candles.len() < self.period {
            return None;
        }

        let typical_prices: Vec<f64> = candles
            .iter()
            .rev()
            .take(self.period)
            .map(Self::typical_price)
            .collect();

        let sma = typical_prices.iter().sum::<f64>() / self.period as f64;
        let mean_dev =
            typical_prices.iter().map(|tp| (tp - sma).abs()).sum::<f64>() / self.period as f64;

        if mean_dev == 0.0 {
            return Some(0.0);
        }

        // typical_prices[0] is the latest candle
        Some((typical_prices[0] - sma) / (0.015 * mean_dev))
    }
}
