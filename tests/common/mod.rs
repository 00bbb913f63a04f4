//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use omen::sources::MarketData;
use omen::{AppError, OhlcPoint, Result, Timeframe};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory market: fixed candles, settable last prices.
pub struct FakeMarket {
    candles: Vec<OhlcPoint>,
    prices: Mutex<HashMap<String, f64>>,
}

impl FakeMarket {
    pub fn new(candles: Vec<OhlcPoint>) -> Self {
        Self {
            candles,
            prices: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn klines(&self, _symbol: &str, _timeframe: Timeframe, limit: usize) -> Result<Vec<OhlcPoint>> {
        let start = self.candles.len().saturating_sub(limit);
        Ok(self.candles[start..].to_vec())
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| AppError::ExternalApi(format!("no price for {}", symbol)))
    }
}

/// Steadily rising candles, one minute apart.
pub fn uptrend(count: usize) -> Vec<OhlcPoint> {
    trend(count, 1.5)
}

/// Steadily falling candles, one minute apart.
pub fn downtrend(count: usize) -> Vec<OhlcPoint> {
    trend(count, -1.5)
}

fn trend(count: usize, step: f64) -> Vec<OhlcPoint> {
    (0..count)
        .map(|i| {
            let base = 500.0 + i as f64 * step;
            OhlcPoint {
                time: 1_700_000_000_000 + i as i64 * 60_000,
                open: base,
                high: base + 2.0,
                low: base - 2.0,
                close: base + step * 0.5,
                volume: 1000.0,
            }
        })
        .collect()
}
