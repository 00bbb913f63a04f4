//! Indicator snapshot: every indicator's value at the latest candle.

use super::indicators::{
    Adx, BollingerBands, BollingerOutput, Cci, Ema, Indicator, Macd, Momentum, Obv,
    ParabolicSar, Rsi, Sma, Stochastic, WilliamsR,
};
use crate::config::IndicatorConfig;
use crate::error::{AppError, Result};
use crate::types::{IndicatorReading, OhlcPoint};
use tracing::debug;

/// Fixed set of indicator values computed from one candle window.
///
/// Values that could not be computed are NaN; vote rules treat them as abstentions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub prev_close: f64,
    pub rsi: f64,
    pub ema: f64,
    pub sma: f64,
    pub adx: f64,
    pub cci: f64,
    pub stoch_k: f64,
    /// Rate of change, percent.
    pub momentum: f64,
    pub boll_upper: f64,
    pub boll_middle: f64,
    pub boll_lower: f64,
    pub sar: f64,
    pub macd_hist: f64,
    pub williams_r: f64,
    pub obv_delta: f64,
}

impl IndicatorSnapshot {
    /// A snapshot with prices set and every indicator unavailable.
    pub fn unavailable(close: f64, prev_close: f64) -> Self {
        Self {
            close,
            prev_close,
            rsi: f64::NAN,
            ema: f64::NAN,
            sma: f64::NAN,
            adx: f64::NAN,
            cci: f64::NAN,
            stoch_k: f64::NAN,
            momentum: f64::NAN,
            boll_upper: f64::NAN,
            boll_middle: f64::NAN,
            boll_lower: f64::NAN,
            sar: f64::NAN,
            macd_hist: f64::NAN,
            williams_r: f64::NAN,
            obv_delta: f64::NAN,
        }
    }

    /// Named values in report order.
    pub fn readings(&self) -> Vec<IndicatorReading> {
        [
            ("RSI", self.rsi),
            ("EMA", self.ema),
            ("SMA", self.sma),
            ("ADX", self.adx),
            ("CCI", self.cci),
            ("Stochastic", self.stoch_k),
            ("Momentum", self.momentum),
            ("Bollinger Upper", self.boll_upper),
            ("Bollinger Mid", self.boll_middle),
            ("Bollinger Lower", self.boll_lower),
            ("SAR", self.sar),
            ("MACD Histogram", self.macd_hist),
            ("WR", self.williams_r),
            ("OBV Delta", self.obv_delta),
        ]
        .into_iter()
        .map(|(name, value)| IndicatorReading { name, value })
        .collect()
    }
}

/// Computes [`IndicatorSnapshot`]s with a fixed set of lookbacks.
pub struct SnapshotBuilder {
    rsi: Rsi,
    ema: Ema,
    sma: Sma,
    adx: Adx,
    cci: Cci,
    stochastic: Stochastic,
    momentum: Momentum,
    bollinger: BollingerBands,
    sar: ParabolicSar,
    macd: Macd,
    williams: WilliamsR,
    obv: Obv,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}

impl SnapshotBuilder {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            rsi: Rsi::new(config.rsi_period),
            ema: Ema::new(config.ema_period),
            sma: Sma::new(config.sma_period),
            adx: Adx::new(config.adx_period),
            cci: Cci::new(config.cci_period),
            stochastic: Stochastic::new(config.stoch_period, 3),
            momentum: Momentum::new(config.momentum_period),
            bollinger: BollingerBands::new(config.bollinger_period, config.bollinger_std_dev),
            sar: ParabolicSar::new(config.sar_step, config.sar_max),
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal),
            williams: WilliamsR::new(config.williams_period),
            obv: Obv::new(config.obv_lookback),
        }
    }

    /// Longest warm-up among all indicators.
    pub fn warmup(&self) -> usize {
        [
            self.rsi.min_periods(),
            self.ema.min_periods(),
            self.sma.min_periods(),
            self.adx.min_periods(),
            self.cci.min_periods(),
            self.stochastic.min_periods(),
            self.momentum.min_periods(),
            self.bollinger.min_periods(),
            self.sar.min_periods(),
            self.macd.min_periods(),
            self.williams.min_periods(),
            self.obv.min_periods(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Candles a request must supply: the longest warm-up plus two.
    pub fn required_candles(&self) -> usize {
        self.warmup() + 2
    }

    /// Build a snapshot at the latest candle.
    pub fn build(&self, candles: &[OhlcPoint]) -> Result<IndicatorSnapshot> {
        let required = self.required_candles();
        if candles.len() < required {
            return Err(AppError::DataUnavailable(format!(
                "got {} candles, need {}",
                candles.len(),
                required
            )));
        }

        let close = candles[candles.len() - 1].close;
        let prev_close = candles[candles.len() - 2].close;
        let mut snapshot = IndicatorSnapshot::unavailable(close, prev_close);

        let value = |name: &str, v: Option<f64>| match v.filter(|x| x.is_finite()) {
            Some(x) => x,
            None => {
                debug!("{} unavailable on {} candles, abstaining", name, candles.len());
                f64::NAN
            }
        };

        snapshot.rsi = value(self.rsi.name(), self.rsi.calculate(candles));
        snapshot.ema = value(self.ema.name(), self.ema.calculate(candles));
        snapshot.sma = value(self.sma.name(), self.sma.calculate(candles));
        snapshot.adx = value(self.adx.name(), self.adx.calculate(candles));
        snapshot.cci = value(self.cci.name(), self.cci.calculate(candles));
        snapshot.stoch_k = value(
            self.stochastic.name(),
            self.stochastic.calculate(candles).map(|s| s.k),
        );
        snapshot.momentum = value(self.momentum.name(), self.momentum.calculate(candles));
        let bands = self.bollinger.calculate(candles);
        let band = |pick: fn(&BollingerOutput) -> f64| {
            value(self.bollinger.name(), bands.as_ref().map(pick))
        };
        snapshot.boll_upper = band(|b| b.upper);
        snapshot.boll_middle = band(|b| b.middle);
        snapshot.boll_lower = band(|b| b.lower);
        snapshot.sar = value(self.sar.name(), self.sar.calculate(candles));
        snapshot.macd_hist = value(
            self.macd.name(),
            self.macd.calculate(candles).map(|m| m.histogram),
        );
        snapshot.williams_r = value(self.williams.name(), self.williams.calculate(candles));
        snapshot.obv_delta = value(self.obv.name(), self.obv.calculate(candles));

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::super::indicators::fixtures::uptrend;
    use super::*;

    #[test]
    fn test_required_candles_default() {
        // SMA(50) has the longest warm-up
        assert_eq!(SnapshotBuilder::default().required_candles(), 52);
    }

    #[test]
    fn test_required_candles_follows_lookbacks() {
        let config = IndicatorConfig {
            sma_period: 10,
            macd_slow: 60,
            ..IndicatorConfig::default()
        };
        assert_eq!(SnapshotBuilder::new(config).required_candles(), 71);
    }

    #[test]
    fn test_build_rejects_short_series() {
        let err = SnapshotBuilder::default().build(&uptrend(51)).unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn test_build_fills_every_field() {
        let candles = uptrend(100);
        let snap = SnapshotBuilder::default().build(&candles).unwrap();
        assert_eq!(snap.close, candles[99].close);
        assert_eq!(snap.prev_close, candles[98].close);
        for reading in snap.readings() {
            assert!(reading.value.is_finite(), "{} not computed", reading.name);
        }
    }

    #[test]
    fn test_unavailable_snapshot_is_nan() {
        let snap = IndicatorSnapshot::unavailable(1.0, 2.0);
        assert_eq!(snap.readings().len(), 14);
        assert!(snap.readings().iter().all(|r| r.value.is_nan()));
    }
}
