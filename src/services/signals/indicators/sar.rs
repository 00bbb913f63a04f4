//! Parabolic SAR (stop and reverse) indicator.

use super::Indicator;
use crate::types::OhlcPoint;

/// Parabolic SAR.
///
/// Trails price from below in an uptrend and from above in a downtrend, accelerating
/// by `step` each time a new extreme is made, up to `max_step`.
pub struct ParabolicSar {
    step: f64,
    max_step: f64,
}

impl Default for ParabolicSar {
    fn default() -> Self {
        Self {
            step: 0.02,
            max_step: 0.2,
        }
    }
}

impl ParabolicSar {
    pub fn new(step: f64, max_step: f64) -> Self {
        Self { step, max_step }
    }
}

impl Indicator for ParabolicSar {
    type Output = f64;

    fn name(&self) -> &str {
        "SAR"
    }

    fn min_periods(&self) -> usize {
        2
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if candles.len() < self.min_periods() || !(self.step > 0.0) {
            return None;
        }

        // Start long below the first candle, or short if the second candle already broke down.
        let mut is_long = candles[1].close >= candles[0].close;
        let mut af = self.step;
        let (mut sar, mut ep) = if is_long {
            (candles[0].low, candles[0].high)
        } else {
            (candles[0].high, candles[0].low)
        };

        for i in 1..candles.len() {
            let current = &candles[i];
            let previous = &candles[i - 1];
            sar += af * (ep - sar);

            if is_long {
                // SAR may not rise above the prior candle's low.
                sar = sar.min(previous.low);
                if current.low < sar {
                    is_long = false;
                    sar = ep;
                    ep = current.low;
                    af = self.step;
                } else if current.high > ep {
                    ep = current.high;
                    af = (af + self.step).min(self.max_step);
                }
            } else {
                sar = sar.max(previous.high);
                if current.high > sar {
                    is_long = true;
                    sar = ep;
                    ep = current.high;
                    af = self.step;
                } else if current.low < ep {
                    ep = current.low;
                    af = (af + self.step).min(self.max_step);
                }
            }
        }

        Some(sar)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{downtrend, uptrend};
    use super::*;

    #[test]
    fn test_sar_below_price_in_uptrend() {
        let candles = uptrend(40);
        let sar = ParabolicSar::default().calculate(&candles).unwrap();
        assert!(sar < candles.last().unwrap().close);
    }

    #[test]
    fn test_sar_above_price_in_downtrend() {
        let candles = downtrend(40);
        let sar = ParabolicSar::default().calculate(&candles).unwrap();
        assert!(sar > candles.last().unwrap().close);
    }

    #[test]
    fn test_sar_needs_two_candles() {
        assert!(ParabolicSar::default().calculate(&uptrend(1)).is_none());
    }
}
