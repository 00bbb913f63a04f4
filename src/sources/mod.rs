//! Market data sources.

pub mod bybit;

pub use bybit::BybitClient;

use crate::error::Result;
use crate::types::{OhlcPoint, Timeframe};
use async_trait::async_trait;

/// Candle and price source used by the signal service and the verifier.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Up to `limit` most recent candles, oldest first.
    async fn klines(&self, symbol: &str, timeframe: Timeframe, limit: usize)
        -> Result<Vec<OhlcPoint>>;

    /// Latest traded price.
    async fn last_price(&self, symbol: &str) -> Result<f64>;
}
