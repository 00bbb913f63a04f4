use crate::error::{AppError, Result};
use crate::services::signals::SnapshotBuilder;
use crate::types::{AggregationMode, GateCondition, IndicatorName, TieBreak, Timeframe, WeightTable};
use std::env;
use std::str::FromStr;

/// Longest accepted verification horizon (30 days).
const MAX_HORIZON_SECS: u64 = 30 * 24 * 60 * 60;

/// Lookback windows for indicator calculations.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub ema_period: usize,
    pub sma_period: usize,
    pub adx_period: usize,
    pub cci_period: usize,
    pub stoch_period: usize,
    pub momentum_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    /// Parabolic SAR acceleration step (also the starting factor).
    pub sar_step: f64,
    /// Parabolic SAR acceleration cap.
    pub sar_max: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub williams_period: usize,
    pub obv_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_period: 21,
            sma_period: 50,
            adx_period: 14,
            cci_period: 20,
            stoch_period: 14,
            momentum_period: 10,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            sar_step: 0.02,
            sar_max: 0.2,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            williams_period: 14,
            obv_lookback: 14,
        }
    }
}

/// Oversold/overbought levels and other vote thresholds.
#[derive(Debug, Clone)]
pub struct VoteThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub wr_oversold: f64,
    pub wr_overbought: f64,
    pub cci_low: f64,
    pub cci_high: f64,
    /// ADX above this counts as "trend present".
    pub adx_trend: f64,
    /// When set, ADX never votes.
    pub adx_direction_agnostic: bool,
}

impl Default for VoteThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            wr_oversold: -80.0,
            wr_overbought: -20.0,
            cci_low: -100.0,
            cci_high: 100.0,
            adx_trend: 20.0,
            adx_direction_agnostic: false,
        }
    }
}

/// Vote aggregation settings.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub mode: AggregationMode,
    pub weights: WeightTable,
    /// Weighted scores within `[-threshold, threshold]` are NEUTRAL.
    pub weighted_threshold: f64,
    pub tie_break: TieBreak,
    /// Minimum LONG fraction of cast votes for the entry gate.
    pub gate_ratio: f64,
    pub gate_conditions: Vec<GateCondition>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::Majority,
            weights: WeightTable::uniform(&IndicatorName::ALL),
            weighted_threshold: 0.0,
            tie_break: TieBreak::Neutral,
            gate_ratio: 1.0,
            gate_conditions: Vec::new(),
        }
    }
}

/// Periodic task intervals.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub auto_signal_interval_secs: u64,
    pub verify_interval_secs: u64,
    pub summary_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_signal_interval_secs: 900,
            verify_interval_secs: 60,
            summary_interval_secs: 86_400,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file for the prediction log.
    pub database_path: String,
    /// Bybit REST base URL.
    pub bybit_api_url: String,
    /// Bybit product category ("linear", "spot").
    pub bybit_category: String,
    /// Symbols the auto-signal task covers.
    pub symbols: Vec<String>,
    /// Candle interval for signals.
    pub timeframe: Timeframe,
    /// Candles requested per signal.
    pub candle_limit: usize,
    /// Indicators allowed to vote, canonical order.
    pub enabled_indicators: Vec<IndicatorName>,
    pub indicators: IndicatorConfig,
    pub thresholds: VoteThresholds,
    pub aggregation: AggregationConfig,
    /// Age a prediction must reach before it is verified.
    pub verification_horizon_secs: u64,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "omen.db".to_string(),
            bybit_api_url: "https://api.bybit.com".to_string(),
            bybit_category: "linear".to_string(),
            symbols: vec!["BTCUSDT".to_string()],
            timeframe: Timeframe::FifteenMinutes,
            candle_limit: 100,
            enabled_indicators: IndicatorName::ALL.to_vec(),
            indicators: IndicatorConfig::default(),
            thresholds: VoteThresholds::default(),
            aggregation: AggregationConfig::default(),
            verification_horizon_secs: 900,
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// Parse a comma-separated indicator list into canonical order without duplicates.
pub fn parse_indicator_list(s: &str) -> Result<Vec<IndicatorName>> {
    let mut names = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let name = IndicatorName::from_str(part)
            .ok_or_else(|| AppError::ConfigInvalid(format!("unknown indicator '{}'", part)))?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Parse a weight table. Format: "RSI:1.0,EMA:1.5,MACD:2".
pub fn parse_weights(s: &str) -> Result<WeightTable> {
    let mut table = WeightTable::default();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, weight) = part.split_once(':').ok_or_else(|| {
            AppError::ConfigInvalid(format!("weight entry '{}' is not NAME:WEIGHT", part))
        })?;
        let indicator = IndicatorName::from_str(name).ok_or_else(|| {
            AppError::ConfigInvalid(format!("weight table names unknown indicator '{}'", name))
        })?;
        let weight: f64 = weight.trim().parse().map_err(|_| {
            AppError::ConfigInvalid(format!("weight for {} is not a number", indicator))
        })?;
        table.insert(indicator, weight);
    }
    Ok(table)
}

/// Parse entry gate conditions. Format: "rsi_oversold,price_below_ema".
pub fn parse_gate_conditions(s: &str) -> Result<Vec<GateCondition>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| {
            GateCondition::from_str(part)
                .ok_or_else(|| AppError::ConfigInvalid(format!("unknown gate condition '{}'", part)))
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let symbols: Vec<String> = env::var("SYMBOLS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.symbols);

        let timeframe = match env::var("TIMEFRAME") {
            Ok(raw) => Timeframe::from_str(&raw)
                .ok_or_else(|| AppError::ConfigInvalid(format!("unknown timeframe '{}'", raw)))?,
            Err(_) => defaults.timeframe,
        };

        let enabled_indicators = match env::var("INDICATORS") {
            Ok(raw) => parse_indicator_list(&raw)?,
            Err(_) => defaults.enabled_indicators,
        };

        let mode = match env::var("AGGREGATION_MODE") {
            Ok(raw) => AggregationMode::from_str(&raw).ok_or_else(|| {
                AppError::ConfigInvalid(format!("unknown aggregation mode '{}'", raw))
            })?,
            Err(_) => AggregationMode::default(),
        };

        let tie_break = match env::var("TIE_BREAK") {
            Ok(raw) => TieBreak::from_str(&raw)
                .ok_or_else(|| AppError::ConfigInvalid(format!("unknown tie break '{}'", raw)))?,
            Err(_) => TieBreak::default(),
        };

        // Without an explicit table every enabled indicator weighs the same.
        let weights = match env::var("INDICATOR_WEIGHTS") {
            Ok(raw) => parse_weights(&raw)?,
            Err(_) => WeightTable::uniform(&enabled_indicators),
        };

        let gate_conditions = match env::var("ENTRY_GATE_REQUIRE") {
            Ok(raw) => parse_gate_conditions(&raw)?,
            Err(_) => Vec::new(),
        };

        let ind = IndicatorConfig::default();
        let th = VoteThresholds::default();
        let sched = SchedulerConfig::default();

        let config = Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            bybit_api_url: env::var("BYBIT_API_URL").unwrap_or(defaults.bybit_api_url),
            bybit_category: env::var("BYBIT_CATEGORY").unwrap_or(defaults.bybit_category),
            symbols,
            timeframe,
            candle_limit: env_or("CANDLE_LIMIT", defaults.candle_limit),
            enabled_indicators,
            indicators: IndicatorConfig {
                rsi_period: env_or("RSI_PERIOD", ind.rsi_period),
                ema_period: env_or("EMA_PERIOD", ind.ema_period),
                sma_period: env_or("SMA_PERIOD", ind.sma_period),
                adx_period: env_or("ADX_PERIOD", ind.adx_period),
                cci_period: env_or("CCI_PERIOD", ind.cci_period),
                stoch_period: env_or("STOCH_PERIOD", ind.stoch_period),
                momentum_period: env_or("MOMENTUM_PERIOD", ind.momentum_period),
                bollinger_period: env_or("BOLLINGER_PERIOD", ind.bollinger_period),
                bollinger_std_dev: env_or("BOLLINGER_STD_DEV", ind.bollinger_std_dev),
                sar_step: env_or("SAR_STEP", ind.sar_step),
                sar_max: env_or("SAR_MAX", ind.sar_max),
                macd_fast: env_or("MACD_FAST", ind.macd_fast),
                macd_slow: env_or("MACD_SLOW", ind.macd_slow),
                macd_signal: env_or("MACD_SIGNAL", ind.macd_signal),
                williams_period: env_or("WILLIAMS_PERIOD", ind.williams_period),
                obv_lookback: env_or("OBV_LOOKBACK", ind.obv_lookback),
            },
            thresholds: VoteThresholds {
                rsi_oversold: env_or("RSI_OVERSOLD", th.rsi_oversold),
                rsi_overbought: env_or("RSI_OVERBOUGHT", th.rsi_overbought),
                stoch_oversold: env_or("STOCH_OVERSOLD", th.stoch_oversold),
                stoch_overbought: env_or("STOCH_OVERBOUGHT", th.stoch_overbought),
                wr_oversold: env_or("WR_OVERSOLD", th.wr_oversold),
                wr_overbought: env_or("WR_OVERBOUGHT", th.wr_overbought),
                cci_low: env_or("CCI_LOW", th.cci_low),
                cci_high: env_or("CCI_HIGH", th.cci_high),
                adx_trend: env_or("ADX_TREND_THRESHOLD", th.adx_trend),
                adx_direction_agnostic: env_flag("ADX_DIRECTION_AGNOSTIC", th.adx_direction_agnostic),
            },
            aggregation: AggregationConfig {
                mode,
                weights,
                weighted_threshold: env_or("WEIGHTED_THRESHOLD", 0.0),
                tie_break,
                gate_ratio: env_or("ENTRY_GATE_RATIO", 1.0),
                gate_conditions,
            },
            verification_horizon_secs: env_or(
                "VERIFICATION_HORIZON_SECS",
                defaults.verification_horizon_secs,
            ),
            scheduler: SchedulerConfig {
                auto_signal_interval_secs: env_or(
                    "AUTO_SIGNAL_INTERVAL_SECS",
                    sched.auto_signal_interval_secs,
                ),
                verify_interval_secs: env_or("VERIFY_INTERVAL_SECS", sched.verify_interval_secs),
                summary_interval_secs: env_or("SUMMARY_INTERVAL_SECS", sched.summary_interval_secs),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings before anything starts.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AppError::ConfigInvalid(msg));

        if self.symbols.is_empty() {
            return invalid("no symbols configured".to_string());
        }
        if self.enabled_indicators.is_empty() {
            return invalid("no indicators enabled".to_string());
        }

        for (name, weight) in self.aggregation.weights.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return invalid(format!("weight for {} must be a non-negative number", name));
            }
        }
        if self.aggregation.mode == AggregationMode::Weighted {
            for (name, _) in self.aggregation.weights.iter() {
                if !self.enabled_indicators.contains(&name) {
                    return invalid(format!("weight table names {} which is not enabled", name));
                }
            }
            for name in &self.enabled_indicators {
                if !self.aggregation.weights.contains(*name) {
                    return invalid(format!("weight table has no entry for {}", name));
                }
            }
        }

        if !(self.aggregation.weighted_threshold >= 0.0) {
            return invalid("weighted threshold must be >= 0".to_string());
        }
        if !(self.aggregation.gate_ratio > 0.0 && self.aggregation.gate_ratio <= 1.0) {
            return invalid("entry gate ratio must be in (0, 1]".to_string());
        }

        let th = &self.thresholds;
        for (label, low, high) in [
            ("RSI", th.rsi_oversold, th.rsi_overbought),
            ("Stochastic", th.stoch_oversold, th.stoch_overbought),
            ("WR", th.wr_oversold, th.wr_overbought),
            ("CCI", th.cci_low, th.cci_high),
        ] {
            if !(low < high) {
                return invalid(format!("{} low threshold must be below high threshold", label));
            }
        }

        let ind = &self.indicators;
        let lookbacks = [
            ind.rsi_period,
            ind.ema_period,
            ind.sma_period,
            ind.adx_period,
            ind.cci_period,
            ind.stoch_period,
            ind.momentum_period,
            ind.bollinger_period,
            ind.macd_fast,
            ind.macd_signal,
            ind.williams_period,
            ind.obv_lookback,
        ];
        if lookbacks.contains(&0) {
            return invalid("indicator lookbacks must be positive".to_string());
        }
        if ind.macd_fast >= ind.macd_slow {
            return invalid("MACD fast period must be below slow period".to_string());
        }
        if !(ind.sar_step > 0.0 && ind.sar_step <= ind.sar_max) {
            return invalid("SAR step must be positive and not above SAR max".to_string());
        }

        let required = SnapshotBuilder::new(ind.clone()).required_candles();
        if self.candle_limit < required {
            return invalid(format!(
                "candle limit {} is below the {} candles indicators need",
                self.candle_limit, required
            ));
        }

        if self.verification_horizon_secs == 0 || self.verification_horizon_secs > MAX_HORIZON_SECS {
            return invalid(format!(
                "verification horizon must be between 1 and {} seconds",
                MAX_HORIZON_SECS
            ));
        }

        let sched = &self.scheduler;
        for (label, secs) in [
            ("auto-signal", sched.auto_signal_interval_secs),
            ("verify", sched.verify_interval_secs),
            ("summary", sched.summary_interval_secs),
        ] {
            if secs == 0 {
                return invalid(format!("{} interval must be positive", label));
            }
        }

        Ok(())
    }

    pub fn verification_horizon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.verification_horizon_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_parse_weights() {
        let table = parse_weights("RSI:1.5, macd:2,WR:0").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.weight(IndicatorName::Rsi), 1.5);
        assert_eq!(table.weight(IndicatorName::Macd), 2.0);
        assert_eq!(table.weight(IndicatorName::WilliamsR), 0.0);
    }

    #[test]
    fn test_parse_weights_rejects_unknown_indicator() {
        let err = parse_weights("RSI:1,VWAP:2").unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid(_)));
    }

    #[test]
    fn test_parse_weights_rejects_malformed_entry() {
        assert!(parse_weights("RSI=1").is_err());
        assert!(parse_weights("RSI:heavy").is_err());
    }

    #[test]
    fn test_parse_indicator_list_sorts_canonically() {
        let names = parse_indicator_list("macd, rsi,ema,rsi").unwrap();
        assert_eq!(
            names,
            vec![IndicatorName::Rsi, IndicatorName::Ema, IndicatorName::Macd]
        );
        assert!(parse_indicator_list("rsi,ichimoku").is_err());
    }

    #[test]
    fn test_parse_gate_conditions() {
        let conditions = parse_gate_conditions("rsi_oversold,price_below_ema").unwrap();
        assert_eq!(
            conditions,
            vec![GateCondition::RsiOversold, GateCondition::PriceBelowEma]
        );
        assert!(parse_gate_conditions("moon_phase").is_err());
    }

    #[test]
    fn test_weight_table_missing_enabled_indicator_is_invalid() {
        let mut config = Config::default();
        config.aggregation.mode = AggregationMode::Weighted;
        config.aggregation.weights =
            WeightTable::from_pairs([(IndicatorName::Rsi, 1.0), (IndicatorName::Ema, 1.0)]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid(_)));
    }

    #[test]
    fn test_weight_for_disabled_indicator_is_invalid() {
        let mut config = Config::default();
        config.aggregation.mode = AggregationMode::Weighted;
        config.enabled_indicators = vec![IndicatorName::Rsi];
        config.aggregation.weights =
            WeightTable::from_pairs([(IndicatorName::Rsi, 1.0), (IndicatorName::Obv, 1.0)]);
        assert!(config.validate().is_err());

        config.aggregation.weights = WeightTable::from_pairs([(IndicatorName::Rsi, 1.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weight_mismatch_ignored_in_majority_mode() {
        let mut config = Config::default();
        config.aggregation.weights = WeightTable::from_pairs([(IndicatorName::Rsi, 1.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_is_invalid() {
        let mut config = Config::default();
        config.aggregation.weights.insert(IndicatorName::Cci, -1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gate_ratio_bounds() {
        let mut config = Config::default();
        config.aggregation.gate_ratio = 0.9;
        assert!(config.validate().is_ok());
        config.aggregation.gate_ratio = 1.2;
        assert!(config.validate().is_err());
        config.aggregation.gate_ratio = 0.0;
        assert!(config.validate().is_err());
        // allowed; the gate itself still needs a LONG majority
        config.aggregation.gate_ratio = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_are_invalid() {
        let mut config = Config::default();
        config.thresholds.rsi_oversold = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_candle_limit_below_warmup_is_invalid() {
        let mut config = Config::default();
        config.candle_limit = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_macd_periods_must_be_ordered() {
        let mut config = Config::default();
        config.indicators.macd_fast = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_verification_horizon_duration() {
        let config = Config::default();
        assert_eq!(config.verification_horizon(), chrono::Duration::minutes(15));
    }

    #[test]
    fn test_zero_task_interval_is_invalid() {
        let zeroers: [fn(&mut SchedulerConfig); 3] = [
            |s| s.auto_signal_interval_secs = 0,
            |s| s.verify_interval_secs = 0,
            |s| s.summary_interval_secs = 0,
        ];
        for set in zeroers {
            let mut config = Config::default();
            set(&mut config.scheduler);
            assert!(matches!(config.validate(), Err(AppError::ConfigInvalid(_))));
        }
    }

    #[test]
    fn test_horizon_bounds() {
        let mut config = Config::default();
        config.verification_horizon_secs = MAX_HORIZON_SECS;
        assert!(config.validate().is_ok());
        assert_eq!(config.verification_horizon(), chrono::Duration::days(30));

        config.verification_horizon_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(AppError::ConfigInvalid(_))));
        config.verification_horizon_secs = 0;
        assert!(config.validate().is_err());
    }
}
