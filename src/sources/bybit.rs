use super::MarketData;
use crate::error::{AppError, Result};
use crate::types::{OhlcPoint, Timeframe};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Bybit caps kline requests at 1000 rows.
const MAX_KLINE_LIMIT: usize = 1000;

/// Bybit v5 response envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitResponse<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

/// Rows are `[startTime, open, high, low, close, volume, turnover]`, newest first.
#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    #[serde(default)]
    list: Vec<BybitTicker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTicker {
    symbol: String,
    last_price: String,
}

fn unwrap_result<T>(response: BybitResponse<T>) -> Result<T> {
    if response.ret_code != 0 {
        return Err(AppError::ExternalApi(format!(
            "Bybit error {}: {}",
            response.ret_code, response.ret_msg
        )));
    }
    response
        .result
        .ok_or_else(|| AppError::ExternalApi("Bybit response has no result".to_string()))
}

fn parse_field(row: &[String], idx: usize) -> Result<f64> {
    row.get(idx)
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| AppError::ExternalApi(format!("malformed kline row {:?}", row)))
}

/// Convert a kline payload to candles, oldest first.
fn parse_klines(body: &str) -> Result<Vec<OhlcPoint>> {
    let response: BybitResponse<KlineResult> = serde_json::from_str(body)?;
    let rows = unwrap_result(response)?.list;

    let mut candles = rows
        .iter()
        .map(|row| -> Result<OhlcPoint> {
            Ok(OhlcPoint {
                time: parse_field(row, 0)? as i64,
                open: parse_field(row, 1)?,
                high: parse_field(row, 2)?,
                low: parse_field(row, 3)?,
                close: parse_field(row, 4)?,
                volume: parse_field(row, 5)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.time);
    Ok(candles)
}

fn parse_last_price(body: &str, symbol: &str) -> Result<f64> {
    let response: BybitResponse<TickerResult> = serde_json::from_str(body)?;
    let ticker = unwrap_result(response)?
        .list
        .into_iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
        .ok_or_else(|| AppError::DataUnavailable(format!("no ticker for {}", symbol)))?;

    ticker
        .last_price
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| AppError::ExternalApi(format!("bad last price '{}'", ticker.last_price)))
}

/// Bybit v5 public market REST client.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    category: String,
}

impl BybitClient {
    pub fn new(base_url: impl Into<String>, category: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent("Omen/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            category: category.into(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            warn!("Bybit API returned {}: {}", status, snippet);
            return Err(AppError::ExternalApi(format!("Bybit API error: {}", status)));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketData for BybitClient {
    async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<OhlcPoint>> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);
        let body = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", self.category.clone()),
                    ("symbol", symbol.to_uppercase()),
                    ("interval", timeframe.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let candles = parse_klines(&body)?;
        debug!(
            "Fetched {} {} candles for {}",
            candles.len(),
            timeframe,
            symbol
        );
        Ok(candles)
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        let body = self
            .get(
                "/v5/market/tickers",
                &[
                    ("category", self.category.clone()),
                    ("symbol", symbol.to_uppercase()),
                ],
            )
            .await?;
        parse_last_price(&body, symbol)
    }
}
