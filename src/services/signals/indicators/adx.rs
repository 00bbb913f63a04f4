//! Average Directional Index (ADX) indicator.

use super::{wilders_smooth, Indicator};
use crate::types::OhlcPoint;

/// ADX (Average Directional Index) indicator.
///
/// Measures trend strength, not direction:
/// - Below 20: Weak trend / ranging market
/// - 20-40: Trending
/// - Above 40: Strong trend
pub struct Adx {
    period: usize,
}

impl Default for Adx {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    fn true_range(current: &OhlcPoint, previous: &OhlcPoint) -> f64 {
        let hl = current.high - current.low;
        let hc = (current.high - previous.close).abs();
        let lc = (current.low - previous.close).abs();
        hl.max(hc).max(lc)
    }
}

impl Indicator for Adx {
    type Output = f64;

    fn name(&self) -> &str {
        "ADX"
    }

    fn min_periods(&self) -> usize {
        self.period * 2 + 1
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if self.period == 0 || candles.len() < self.min_periods() {
            return None;
        }

        let mut plus_dm = Vec::with_capacity(candles.len() - 1);
        let mut minus_dm = Vec::with_capacity(candles.len() - 1);
        let mut tr = Vec::with_capacity(candles.len() - 1);

        for w in candles.windows(2) {
            let (previous, current) = (&w[0], &w[1]);
            let up_move = current.high - previous.high;
            let down_move = previous.low - current.low;

            plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
            minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
            tr.push(Self::true_range(current, previous));
        }

        let smoothed_plus_dm = wilders_smooth(&plus_dm, self.period);
        let smoothed_minus_dm = wilders_smooth(&minus_dm, self.period);
        let smoothed_tr = wilders_smooth(&tr, self.period);

        let dx_values: Vec<f64> = smoothed_tr
            .iter()
            .zip(smoothed_plus_dm.iter().zip(smoothed_minus_dm.iter()))
            .map(|(atr, (pdm, mdm))| {
                if *atr == 0.0 {
                    return 0.0;
                }
                let plus_di = pdm / atr * 100.0;
                let minus_di = mdm / atr * 100.0;
                let di_sum = plus_di + minus_di;
                if di_sum > 0.0 {
                    (plus_di - minus_di).abs() / di_sum * 100.0
                } else {
                    0.0
                }
            })
            .collect();

        wilders_smooth(&dx_values, self.period).last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{downtrend, flat, uptrend};
    use super::*;

    #[test]
    fn test_adx_min_periods() {
        assert_eq!(Adx::default().min_periods(), 29);
    }

    #[test]
    fn test_adx_insufficient_data() {
        assert!(Adx::default().calculate(&uptrend(20)).is_none());
    }

    #[test]
    fn test_adx_strong_trend_either_direction() {
        let up = Adx::default().calculate(&uptrend(60)).unwrap();
        let down = Adx::default().calculate(&downtrend(60)).unwrap();
        assert!(up > 20.0, "ADX in uptrend should show a trend, got {}", up);
        assert!(down > 20.0, "ADX in downtrend should show a trend, got {}", down);
    }

    #[test]
    fn test_adx_flat_market_is_zero() {
        assert_eq!(Adx::default().calculate(&flat(60, 100.0)), Some(0.0));
    }
}
