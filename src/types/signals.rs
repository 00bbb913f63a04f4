use crate::types::Timeframe;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Indicators that can cast a vote, in canonical order.
///
/// The derived `Ord` follows declaration order, so sorting by name is sorting canonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorName {
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "SMA")]
    Sma,
    #[serde(rename = "ADX")]
    Adx,
    #[serde(rename = "CCI")]
    Cci,
    #[serde(rename = "Stochastic")]
    Stochastic,
    #[serde(rename = "Momentum")]
    Momentum,
    #[serde(rename = "Bollinger")]
    Bollinger,
    #[serde(rename = "SAR")]
    Sar,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "WR")]
    WilliamsR,
    #[serde(rename = "OBV")]
    Obv,
}

impl IndicatorName {
    /// Every voting indicator in canonical order.
    pub const ALL: [IndicatorName; 12] = [
        Self::Rsi,
        Self::Ema,
        Self::Sma,
        Self::Adx,
        Self::Cci,
        Self::Stochastic,
        Self::Momentum,
        Self::Bollinger,
        Self::Sar,
        Self::Macd,
        Self::WilliamsR,
        Self::Obv,
    ];

    /// Parse from a config or query string (case-insensitive, a few aliases).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rsi" => Some(Self::Rsi),
            "ema" => Some(Self::Ema),
            "sma" => Some(Self::Sma),
            "adx" => Some(Self::Adx),
            "cci" => Some(Self::Cci),
            "stochastic" | "stoch" => Some(Self::Stochastic),
            "momentum" | "roc" => Some(Self::Momentum),
            "bollinger" | "boll" | "bb" => Some(Self::Bollinger),
            "sar" => Some(Self::Sar),
            "macd" => Some(Self::Macd),
            "wr" | "williams_r" | "williamsr" => Some(Self::WilliamsR),
            "obv" => Some(Self::Obv),
            _ => None,
        }
    }

    /// Display label, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rsi => "RSI",
            Self::Ema => "EMA",
            Self::Sma => "SMA",
            Self::Adx => "ADX",
            Self::Cci => "CCI",
            Self::Stochastic => "Stochastic",
            Self::Momentum => "Momentum",
            Self::Bollinger => "Bollinger",
            Self::Sar => "SAR",
            Self::Macd => "MACD",
            Self::WilliamsR => "WR",
            Self::Obv => "OBV",
        }
    }
}

impl std::fmt::Display for IndicatorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of a single cast vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// One indicator's cast vote. Abstentions never appear as a `Vote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub indicator: IndicatorName,
    pub vote: Direction,
}

impl Vote {
    pub fn new(indicator: IndicatorName, vote: Direction) -> Self {
        Self { indicator, vote }
    }
}

/// Aggregated directional call, also used for the realized direction of a verified record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Long,
    Short,
    Neutral,
}

impl Decision {
    /// Realized direction of a price move from `reference` to `current`.
    pub fn from_price_move(reference: f64, current: f64) -> Self {
        if current > reference {
            Decision::Long
        } else if current < reference {
            Decision::Short
        } else {
            Decision::Neutral
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LONG" => Some(Decision::Long),
            "SHORT" => Some(Decision::Short),
            "NEUTRAL" => Some(Decision::Neutral),
            _ => None,
        }
    }

    /// Persisted spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Long => "LONG",
            Decision::Short => "SHORT",
            Decision::Neutral => "NEUTRAL",
        }
    }

    /// Swap LONG and SHORT, NEUTRAL stays.
    pub fn negate(&self) -> Self {
        match self {
            Decision::Long => Decision::Short,
            Decision::Short => Decision::Long,
            Decision::Neutral => Decision::Neutral,
        }
    }
}

impl From<Direction> for Decision {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => Decision::Long,
            Direction::Short => Decision::Short,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the vote list is reduced to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    #[default]
    Majority,
    Weighted,
}

impl AggregationMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "majority" => Some(Self::Majority),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Majority => "majority",
            Self::Weighted => "weighted",
        }
    }
}

/// Decision used when the weighted score is exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    Neutral,
    Short,
}

impl TieBreak {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Some(Self::Neutral),
            "short" => Some(Self::Short),
            _ => None,
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            TieBreak::Neutral => Decision::Neutral,
            TieBreak::Short => Decision::Short,
        }
    }
}

/// Extra snapshot condition the entry gate can require on top of the LONG ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCondition {
    RsiOversold,
    PriceBelowEma,
}

impl GateCondition {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rsi_oversold" => Some(Self::RsiOversold),
            "price_below_ema" => Some(Self::PriceBelowEma),
            _ => None,
        }
    }
}

/// Non-negative weight per indicator for the weighted aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightTable(BTreeMap<IndicatorName, f64>);

impl WeightTable {
    /// Weight 1.0 for each of the given indicators.
    pub fn uniform(indicators: &[IndicatorName]) -> Self {
        Self(indicators.iter().map(|name| (*name, 1.0)).collect())
    }

    pub fn from_pairs<I: IntoIterator<Item = (IndicatorName, f64)>>(pairs: I) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Weight for an indicator, zero when the table has no entry.
    pub fn weight(&self, indicator: IndicatorName) -> f64 {
        self.0.get(&indicator).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, indicator: IndicatorName) -> bool {
        self.0.contains_key(&indicator)
    }

    pub fn insert(&mut self, indicator: IndicatorName, weight: f64) {
        self.0.insert(indicator, weight);
    }

    /// Entries in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (IndicatorName, f64)> + '_ {
        self.0.iter().map(|(name, weight)| (*name, *weight))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fields of a prediction supplied by the caller of `append`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub reference_price: f64,
    pub decision: Decision,
    pub votes: Vec<Vote>,
    pub weights: Option<WeightTable>,
}

impl NewPrediction {
    /// A prediction stamped with the current time.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        reference_price: f64,
        decision: Decision,
        votes: Vec<Vote>,
    ) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            timeframe,
            timestamp: Utc::now(),
            reference_price,
            decision,
            votes,
            weights: None,
        }
    }

    /// Override the creation time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the weight table that produced the decision.
    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = Some(weights);
        self
    }
}

/// A persisted prediction. Only the verification fields ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: i64,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub reference_price: f64,
    pub decision: Decision,
    pub votes: Vec<Vote>,
    pub timeframe: Timeframe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightTable>,
    /// Realized direction; `None` while pending verification.
    pub actual: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl PredictionRecord {
    pub fn is_pending(&self) -> bool {
        self.actual.is_none()
    }

    /// Whether the record is pending and at least `horizon` old at `now`.
    pub fn is_due(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        self.is_pending() && now - self.timestamp >= horizon
    }

    /// Hit or miss of the stored decision. `None` while pending or for NEUTRAL decisions.
    pub fn is_hit(&self) -> Option<bool> {
        if self.decision == Decision::Neutral {
            return None;
        }
        self.actual.map(|actual| actual == self.decision)
    }

    /// Hit or miss of one indicator's own vote on this record, if it voted.
    pub fn indicator_hit(&self, indicator: IndicatorName) -> Option<bool> {
        let actual = self.actual?;
        self.votes
            .iter()
            .find(|v| v.indicator == indicator)
            .map(|v| Decision::from(v.vote) == actual)
    }
}

/// Verification state of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Verified,
}

impl PredictionStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "unverified" => Some(Self::Pending),
            "verified" | "validated" => Some(Self::Verified),
            _ => None,
        }
    }
}

/// One named value for the human-facing report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorReading {
    pub name: &'static str,
    pub value: f64,
}

/// Rule-based short-horizon outlook shown next to the vote decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlook {
    pub direction: Decision,
    pub reason: String,
}

/// Everything produced by one signal request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub prev_close: f64,
    pub indicators: Vec<IndicatorReading>,
    pub votes: Vec<Vote>,
    pub long_votes: usize,
    pub short_votes: usize,
    pub decision: Decision,
    pub mode: AggregationMode,
    /// Weighted score, present in weighted mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub entry_alert: bool,
    pub outlook: Outlook,
    /// Id of the stored record, if storing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_id: Option<i64>,
    /// Set when the signal was computed but could not be stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

impl std::fmt::Display for SignalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} (timeframe {})", self.symbol, self.timeframe)?;
        writeln!(f, "Close: {}", self.close)?;
        writeln!(f, "Previous: {}", self.prev_close)?;
        for reading in &self.indicators {
            if reading.value.is_finite() {
                writeln!(f, "{}: {:.2}", reading.name, reading.value)?;
            } else {
                writeln!(f, "{}: n/a", reading.name)?;
            }
        }
        let votes: Vec<String> = self
            .votes
            .iter()
            .map(|v| format!("{}={}", v.indicator, Decision::from(v.vote)))
            .collect();
        writeln!(f, "Votes: [{}]", votes.join(", "))?;
        writeln!(
            f,
            "Signal: {} ({} LONG / {} SHORT)",
            self.decision, self.long_votes, self.short_votes
        )?;
        if let Some(score) = self.score {
            writeln!(f, "Weighted score: {:.2}", score)?;
        }
        writeln!(
            f,
            "Next candle outlook: {} ({})",
            self.outlook.direction, self.outlook.reason
        )?;
        if self.entry_alert {
            writeln!(f, "Entry alert: strong LONG consensus")?;
        }
        if let Some(ref err) = self.storage_error {
            writeln!(f, "Warning: prediction not saved ({})", err)?;
        }
        Ok(())
    }
}

/// Hit/miss counts. NEUTRAL decisions are counted as `skipped` and kept out of the ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyStats {
    pub hits: u64,
    pub total: u64,
    pub skipped: u64,
}

impl AccuracyStats {
    /// Count one outcome; `None` means the record does not take part in the ratio.
    pub fn record(&mut self, hit: Option<bool>) {
        match hit {
            Some(true) => {
                self.hits += 1;
                self.total += 1;
            }
            Some(false) => self.total += 1,
            None => self.skipped += 1,
        }
    }

    pub fn misses(&self) -> u64 {
        self.total - self.hits
    }

    /// Hit rate in percent, or `None` ("no data") when nothing has been verified.
    pub fn accuracy_pct(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.hits as f64 / self.total as f64 * 100.0)
    }
}

impl std::fmt::Display for AccuracyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.accuracy_pct() {
            Some(pct) => write!(f, "{}/{} correct ({:.1}%)", self.hits, self.total, pct),
            None => f.write_str("no data"),
        }
    }
}

/// Accuracy of one indicator's own votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorAccuracy {
    pub indicator: IndicatorName,
    pub stats: AccuracyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_pct: Option<f64>,
}

/// Result of an accuracy query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    pub overall: AccuracyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_pct: Option<f64>,
    pub by_timeframe: BTreeMap<String, AccuracyStats>,
    pub by_symbol: BTreeMap<String, AccuracyStats>,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Accuracy: {}", self.overall)?;
        writeln!(
            f,
            "Hits: {}  Misses: {}  Total: {}  Neutral skipped: {}",
            self.overall.hits,
            self.overall.misses(),
            self.overall.total,
            self.overall.skipped
        )?;
        for (timeframe, stats) in &self.by_timeframe {
            writeln!(f, "  timeframe {}: {}", timeframe, stats)?;
        }
        Ok(())
    }
}
