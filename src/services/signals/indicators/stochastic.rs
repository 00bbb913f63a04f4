//! Stochastic Oscillator indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// Stochastic Oscillator.
///
/// %K = (Current Close - Lowest Low) / (Highest High - Lowest Low) * 100
/// %D = SMA of %K
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticOutput {
    pub k: f64,
    pub d: f64,
}

impl Default for Stochastic {
    fn default() -> Self {
        Self {
            k_period: 14,
            d_period: 3,
        }
    }
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        Self { k_period, d_period }
    }
}

impl Indicator for Stochastic {
    type Output = StochasticOutput;

    fn name(&self) -> &str {
        "Stochastic"
    }

    fn min_periods(&self) -> usize {
        self.k_period + self.d_period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<StochasticOutput> {
        if self.k_period == 0 || self.d_period == 0 || candles.len() < self.min_periods() {
            return None;
        }

        let k_values: Vec<f64> = candles
            .windows(self.k_period)
            .map(|window| {
                let lowest_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
                let highest_high = window
                    .iter()
                    .map(|c| c.high)
                    .fold(f64::NEG_INFINITY, f64::max);
                let close = window[window.len() - 1].close;

                if highest_high != lowest_low {
                    (close - lowest_low) / (highest_high - lowest_low) * 100.0
                } else {
                    50.0
                }
            })
            .collect();

        let k = *k_values.last()?;
        let d = k_values.iter().rev().take(self.d_period).sum::<f64>() / self.d_period as f64;

        Some(StochasticOutput { k, d })
    }
}
