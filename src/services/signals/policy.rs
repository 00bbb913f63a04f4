//! Vote policy: turns an indicator snapshot into per-indicator votes.

use super::snapshot::IndicatorSnapshot;
use crate::config::VoteThresholds;
use crate::types::{Decision, Direction, IndicatorName, Outlook, Vote};

/// Oversold below `low` votes LONG, overbought above `high` votes SHORT.
fn oscillator(value: f64, low: f64, high: f64) -> Option<Direction> {
    if !value.is_finite() {
        None
    } else if value < low {
        Some(Direction::Long)
    } else if value > high {
        Some(Direction::Short)
    } else {
        None
    }
}

/// Close above the level votes LONG, otherwise SHORT.
fn price_position(close: f64, level: f64) -> Option<Direction> {
    if !close.is_finite() || !level.is_finite() {
        None
    } else if close > level {
        Some(Direction::Long)
    } else {
        Some(Direction::Short)
    }
}

/// Positive votes LONG, non-positive votes SHORT.
fn sign(value: f64) -> Option<Direction> {
    if !value.is_finite() {
        None
    } else if value > 0.0 {
        Some(Direction::Long)
    } else {
        Some(Direction::Short)
    }
}

/// Mean reversion at the band edges; inside the band abstains.
fn band_edges(close: f64, upper: f64, lower: f64) -> Option<Direction> {
    if !close.is_finite() || !upper.is_finite() || !lower.is_finite() {
        None
    } else if close > upper {
        Some(Direction::Short)
    } else if close < lower {
        Some(Direction::Long)
    } else {
        None
    }
}

/// Per-indicator vote rules over the enabled indicators.
#[derive(Debug, Clone)]
pub struct VotePolicy {
    enabled: Vec<IndicatorName>,
    thresholds: VoteThresholds,
}

impl Default for VotePolicy {
    fn default() -> Self {
        Self::new(IndicatorName::ALL.to_vec(), VoteThresholds::default())
    }
}

impl VotePolicy {
    pub fn new(mut enabled: Vec<IndicatorName>, thresholds: VoteThresholds) -> Self {
        enabled.sort();
        enabled.dedup();
        Self {
            enabled,
            thresholds,
        }
    }

    pub fn enabled(&self) -> &[IndicatorName] {
        &self.enabled
    }

    /// One indicator's vote, or `None` when it abstains.
    pub fn vote(&self, indicator: IndicatorName, snap: &IndicatorSnapshot) -> Option<Direction> {
        let th = &self.thresholds;
        match indicator {
            IndicatorName::Rsi => oscillator(snap.rsi, th.rsi_oversold, th.rsi_overbought),
            IndicatorName::Ema => price_position(snap.close, snap.ema),
            IndicatorName::Sma => price_position(snap.close, snap.sma),
            IndicatorName::Adx => {
                // Strength only: a strong trend counts as LONG, never as SHORT.
                if th.adx_direction_agnostic || !snap.adx.is_finite() {
                    None
                } else if snap.adx > th.adx_trend {
                    Some(Direction::Long)
                } else {
                    None
                }
            }
            IndicatorName::Cci => {
                // Trend-following: breakouts above the high band vote LONG.
                oscillator(snap.cci, th.cci_low, th.cci_high).map(|d| d.opposite())
            }
            IndicatorName::Stochastic => {
                oscillator(snap.stoch_k, th.stoch_oversold, th.stoch_overbought)
            }
            IndicatorName::Momentum => sign(snap.momentum),
            IndicatorName::Bollinger => band_edges(snap.close, snap.boll_upper, snap.boll_lower),
            IndicatorName::Sar => price_position(snap.close, snap.sar),
            IndicatorName::Macd => sign(snap.macd_hist),
            IndicatorName::WilliamsR => {
                oscillator(snap.williams_r, th.wr_oversold, th.wr_overbought)
            }
            IndicatorName::Obv => sign(snap.obv_delta),
        }
    }

    /// Votes of every enabled indicator, canonical order, abstentions omitted.
    pub fn votes(&self, snap: &IndicatorSnapshot) -> Vec<Vote> {
        self.enabled
            .iter()
            .filter_map(|name| self.vote(*name, snap).map(|d| Vote::new(*name, d)))
            .collect()
    }
}

/// Next-candle outlook from trend strength and aligned momentum.
///
/// Only called when ADX shows a trend: LONG needs positive momentum, RSI above 55,
/// CCI above 50 and the close above the EMA; SHORT needs the mirror image.
pub fn outlook(snap: &IndicatorSnapshot, adx_trend: f64) -> Outlook {
    let neutral = |reason: String| Outlook {
        direction: Decision::Neutral,
        reason,
    };

    if !snap.adx.is_finite() {
        return neutral("ADX unavailable".to_string());
    }
    if snap.adx <= adx_trend {
        return neutral(format!("ADX below {} (weak trend)", adx_trend));
    }

    if snap.momentum > 0.0 && snap.rsi > 55.0 && snap.cci > 50.0 && snap.close > snap.ema {
        Outlook {
            direction: Decision::Long,
            reason: "price above EMA with bullish momentum".to_string(),
        }
    } else if snap.momentum < 0.0 && snap.rsi < 45.0 && snap.cci < -50.0 && snap.close < snap.ema
    {
        Outlook {
            direction: Decision::Short,
            reason: "price below EMA with bearish momentum".to_string(),
        }
    } else {
        neutral("trend without aligned momentum".to_string())
    }
}
