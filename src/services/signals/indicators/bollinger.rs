//! Bollinger Bands indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// Bollinger Bands indicator.
///
/// - Middle band: SMA(period)
/// - Upper band: SMA + k * StdDev
/// - Lower band: SMA - k * StdDev
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Self {
        Self {
            period,
            std_dev_multiplier,
        }
    }
}

impl Indicator for BollingerBands {
    type Output = BollingerOutput;

    fn name(&self) -> &str {
        "Bollinger"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<BollingerOutput> {
        if self.period == 0 || candles.len() < self.period {
            return None;
        }

        let closes: Vec<f64> = candles
            .iter()
            .rev()
            .take(self.period)
            .map(|c| c.close)
            .collect();

        let middle = closes.iter().sum::<f64>() / self.period as f64;
        // Population standard deviation
        let variance =
            closes.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / self.period as f64;
        let width = self.std_dev_multiplier * variance.sqrt();

        Some(BollingerOutput {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }
}
