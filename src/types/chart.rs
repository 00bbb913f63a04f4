use serde::{Deserialize, Serialize};

/// Candle interval, expressed the way the exchange and the stored records spell it
/// ("15", "60", "D").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    TwelveHours,
    OneDay,
    OneWeek,
}

impl Timeframe {
    /// Parse from the exchange spelling. Accepts a few common aliases ("15m", "1h").
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "1m" => Some(Self::OneMinute),
            "3" | "3m" => Some(Self::ThreeMinutes),
            "5" | "5m" => Some(Self::FiveMinutes),
            "15" | "15m" => Some(Self::FifteenMinutes),
            "30" | "30m" => Some(Self::ThirtyMinutes),
            "60" | "1h" => Some(Self::OneHour),
            "120" | "2h" => Some(Self::TwoHours),
            "240" | "4h" => Some(Self::FourHours),
            "360" | "6h" => Some(Self::SixHours),
            "720" | "12h" => Some(Self::TwelveHours),
            "d" | "1d" => Some(Self::OneDay),
            "w" | "1w" => Some(Self::OneWeek),
            _ => None,
        }
    }

    /// Exchange spelling, also used in the persisted `timeframe` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1",
            Self::ThreeMinutes => "3",
            Self::FiveMinutes => "5",
            Self::FifteenMinutes => "15",
            Self::ThirtyMinutes => "30",
            Self::OneHour => "60",
            Self::TwoHours => "120",
            Self::FourHours => "240",
            Self::SixHours => "360",
            Self::TwelveHours => "720",
            Self::OneDay => "D",
            Self::OneWeek => "W",
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::FifteenMinutes
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| format!("unknown timeframe '{}'", value))
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.as_str().to_string()
    }
}

/// OHLCV candle, ordered oldest to newest in every slice the crate passes around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcPoint {
    /// Candle open time, Unix milliseconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_from_str() {
        assert_eq!(Timeframe::from_str("15"), Some(Timeframe::FifteenMinutes));
        assert_eq!(Timeframe::from_str("15m"), Some(Timeframe::FifteenMinutes));
        assert_eq!(Timeframe::from_str("60"), Some(Timeframe::OneHour));
        assert_eq!(Timeframe::from_str("D"), Some(Timeframe::OneDay));
        assert_eq!(Timeframe::from_str("17"), None);
    }

    #[test]
    fn test_timeframe_serializes_as_exchange_spelling() {
        let json = serde_json::to_string(&Timeframe::ThirtyMinutes).unwrap();
        assert_eq!(json, "\"30\"");

        let parsed: Timeframe = serde_json::from_str("\"240\"").unwrap();
        assert_eq!(parsed, Timeframe::FourHours);
        assert!(serde_json::from_str::<Timeframe>("\"banana\"").is_err());
    }
}
