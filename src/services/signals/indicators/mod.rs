//! Technical indicator implementations.
//!
//! Each indicator reads an oldest-to-newest candle slice and reports its value at the
//! latest candle, or `None` when the slice is too short or the value is undefined.

pub mod adx;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod obv;
pub mod rsi;
pub mod sar;
pub mod sma;
pub mod stochastic;
pub mod williams;

pub use adx::Adx;
pub use bollinger::{BollingerBands, BollingerOutput};
pub use cci::Cci;
pub use ema::Ema;
pub use macd::{Macd, MacdOutput};
pub use momentum::Momentum;
pub use obv::Obv;
pub use rsi::Rsi;
pub use sar::ParabolicSar;
pub use sma::Sma;
pub use stochastic::{Stochastic, StochasticOutput};
pub use williams::WilliamsR;

use crate::types::OhlcPoint;

/// Trait for implementing technical indicators.
pub trait Indicator: Send + Sync {
    /// Value reported at the latest candle.
    type Output;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Minimum number of candles required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the indicator from OHLC candle data.
    /// Returns None if there is insufficient data or the value is undefined.
    fn calculate(&self, candles: &[OhlcPoint]) -> Option<Self::Output>;
}

/// Exponential moving average series, seeded with the SMA of the first `period` values.
///
/// The first element corresponds to `values[period - 1]`.
pub(crate) fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values.iter().take(period).sum::<f64>() / period as f64;

    let mut ema = Vec::with_capacity(values.len() - period + 1);
    ema.push(seed);
    let mut last = seed;
    for value in &values[period..] {
        last = (value - last) * multiplier + last;
        ema.push(last);
    }
    ema
}

/// Wilder's smoothed moving average series.
pub(crate) fn wilders_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut last = values.iter().take(period).sum::<f64>() / period as f64;
    result.push(last);
    for value in &values[period..] {
        last = (last * (period - 1) as f64 + value) / period as f64;
        result.push(last);
    }
    result
}

/// Shared candle fixtures for indicator tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::OhlcPoint;

    pub fn candle(i: usize, close: f64) -> OhlcPoint {
        OhlcPoint {
            time: 1_000_000 + i as i64 * 60_000,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    pub fn uptrend(count: usize) -> Vec<OhlcPoint> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64 * 1.5;
                OhlcPoint {
                    time: 1_000_000 + i as i64 * 60_000,
                    open: base,
                    high: base + 2.0,
                    low: base - 1.0,
                    close: base + 1.0,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    pub fn downtrend(count: usize) -> Vec<OhlcPoint> {
        (0..count)
            .map(|i| {
                let base = 200.0 - i as f64 * 1.5;
                OhlcPoint {
                    time: 1_000_000 + i as i64 * 60_000,
                    open: base,
                    high: base + 1.0,
                    low: base - 2.0,
                    close: base - 1.0,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    pub fn flat(count: usize, price: f64) -> Vec<OhlcPoint> {
        (0..count).map(|i| candle(i, price)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_series_seeded_with_sma() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ema = ema_series(&values, 3);
        assert_eq!(ema.len(), 3);
        assert!((ema[0] - 2.0).abs() < 1e-9);
        // multiplier 0.5: (4 - 2) * 0.5 + 2 = 3, (5 - 3) * 0.5 + 3 = 4
        assert!((ema[1] - 3.0).abs() < 1e-9);
        assert!((ema[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_series_helpers_short_input() {
        assert!(ema_series(&[1.0, 2.0], 3).is_empty());
        assert!(wilders_smooth(&[1.0], 2).is_empty());
        assert!(ema_series(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_wilders_smooth() {
        let smoothed = wilders_smooth(&[2.0, 4.0, 6.0], 2);
        assert_eq!(smoothed, vec![3.0, 4.5]);
    }
}
