//! Rate of change (momentum) indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// Percent change of the close over `period` candles.
pub struct Momentum {
    period: usize,
}

impl Default for Momentum {
    fn default() -> Self {
        Self { period: 10 }
    }
}

impl Momentum {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Momentum {
    type Output = f64;

    fn name(&self) -> &str {
        "Momentum"
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if self.period == 0 || candles.len() < self.min_periods() {
            return None;
        }

        let current = candles[candles.len() - 1].close;
        let base = candles[candles.len() - 1 - self.period].close;
        if base == 0.0 {
            return None;
        }

        Some((current - base) / base * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::candle;
    use super::*;

    #[test]
    fn test_momentum_percent_change() {
        let candles: Vec<OhlcPoint> = [100.0, 105.0, 110.0]
            .iter()
            .enumerate()
            .map(|(i, c)| candle(i, *c))
            .collect();
        let roc = Momentum::new(2).calculate(&candles).unwrap();
        assert!((roc - 10.0).abs() < 1e-9);
        assert!(Momentum::new(3).calculate(&candles).is_none());
    }

    #[test]
    fn test_momentum_zero_base_is_undefined() {
        let candles = vec![candle(0, 0.0), candle(1, 5.0)];
        assert!(Momentum::new(1).calculate(&candles).is_none());
    }
}
