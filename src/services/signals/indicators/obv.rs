//! On-Balance Volume (OBV) indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// OBV (On-Balance Volume) change over a lookback window.
///
/// OBV adds the candle's volume when the close rises and subtracts it when the close
/// falls. The reported value is OBV now minus OBV `lookback` candles ago.
pub struct Obv {
    lookback: usize,
}

impl Default for Obv {
    fn default() -> Self {
        Self { lookback: 14 }
    }
}

impl Obv {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Indicator for Obv {
    type Output = f64;

    fn name(&self) -> &str {
        "OBV"
    }

    fn min_periods(&self) -> usize {
        self.lookback + 1
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if self.lookback == 0 || candles.len() < self.min_periods() {
            return None;
        }

        let start = candles.len() - 1 - self.lookback;
        let delta = candles[start..]
            .windows(2)
            .map(|w| {
                if w[1].close > w[0].close {
                    w[1].volume
                } else if w[1].close < w[0].close {
                    -w[1].volume
                } else {
                    0.0
                }
            })
            .sum();

        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{candle, downtrend, uptrend};
    use super::*;

    #[test]
    fn test_obv_delta_sign() {
        assert_eq!(Obv::default().calculate(&uptrend(20)), Some(14_000.0));
        assert_eq!(Obv::default().calculate(&downtrend(20)), Some(-14_000.0));
    }

    #[test]
    fn test_obv_only_counts_lookback() {
        let mut candles: Vec<OhlcPoint> = [10.0, 12.0, 11.0, 11.0]
            .iter()
            .enumerate()
            .map(|(i, c)| candle(i, *c))
            .collect();
        candles[2].volume = 300.0;
        // last two moves: down on 300, unchanged
        assert_eq!(Obv::new(2).calculate(&candles), Some(-300.0));
        assert_eq!(Obv::new(4).calculate(&candles), None);
    }
}
