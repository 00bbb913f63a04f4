//! Signal API endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::services::signals::VerificationSummary;
use crate::services::PredictionFilter;
use crate::types::{
    AccuracyReport, IndicatorAccuracy, PredictionRecord, PredictionStatus, SignalReport, Timeframe,
};
use crate::AppState;

const DEFAULT_PREDICTION_LIMIT: usize = 100;
const MAX_PREDICTION_LIMIT: usize = 1000;

/// Query parameters for the signal endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SignalQuery {
    /// Candle interval ("15", "60", "D"); defaults to the configured timeframe.
    pub timeframe: Option<String>,
}

/// Query parameters for the accuracy endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AccuracyQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    /// RFC 3339, inclusive.
    pub since: Option<String>,
    /// RFC 3339, exclusive.
    pub until: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionsQuery {
    /// `pending` or `verified`; both when absent.
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// Create the signals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accuracy", get(get_accuracy))
        .route("/accuracy/indicators", get(get_indicator_accuracy))
        .route("/predictions", get(get_predictions))
        .route("/verify", post(verify_now))
        .route("/:symbol", get(get_signal))
}

fn parse_timeframe(raw: Option<&str>, default: Timeframe) -> Result<Timeframe> {
    match raw {
        None => Ok(default),
        Some(s) => Timeframe::from_str(s)
            .ok_or_else(|| AppError::BadRequest(format!("unknown timeframe '{}'", s))),
    }
}

fn parse_time(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AppError::BadRequest(format!("invalid {} '{}': {}", field, s, e)))
    })
    .transpose()
}

fn validate_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(format!("invalid symbol '{}'", symbol)));
    }
    Ok(symbol)
}

impl AccuracyQuery {
    /// Convert to a store filter, rejecting malformed values.
    pub fn to_filter(&self) -> Result<PredictionFilter> {
        let filter = PredictionFilter {
            symbol: self.symbol.as_deref().map(validate_symbol).transpose()?,
            timeframe: self
                .timeframe
                .as_deref()
                .map(|tf| parse_timeframe(Some(tf), Timeframe::default()))
                .transpose()?,
            since: parse_time(self.since.as_deref(), "since")?,
            until: parse_time(self.until.as_deref(), "until")?,
        };

        if let (Some(since), Some(until)) = (filter.since, filter.until) {
            if since >= until {
                return Err(AppError::BadRequest("since must be before until".to_string()));
            }
        }
        Ok(filter)
    }
}

impl PredictionsQuery {
    pub fn status(&self) -> Result<Option<PredictionStatus>> {
        self.status
            .as_deref()
            .map(|s| {
                PredictionStatus::from_str(s)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown status '{}'", s)))
            })
            .transpose()
    }

    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PREDICTION_LIMIT)
            .clamp(1, MAX_PREDICTION_LIMIT)
    }
}

/// Compute, store and return the current signal for a symbol.
async fn get_signal(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<SignalQuery>,
) -> Result<Json<ApiResponse<SignalReport>>> {
    let symbol = validate_symbol(&symbol)?;
    let timeframe = parse_timeframe(query.timeframe.as_deref(), state.config.timeframe)?;

    let report = state.signal_service.generate(&symbol, timeframe).await?;
    Ok(Json(ApiResponse::new(report)))
}

/// Accuracy of verified predictions, optionally filtered.
async fn get_accuracy(
    State(state): State<AppState>,
    Query(query): Query<AccuracyQuery>,
) -> Result<Json<ApiResponse<AccuracyReport>>> {
    let filter = query.to_filter()?;
    let report = state.reporter.report(filter).await?;
    Ok(Json(ApiResponse::new(report)))
}

/// Per-indicator hit rates, best first.
async fn get_indicator_accuracy(
    State(state): State<AppState>,
    Query(query): Query<AccuracyQuery>,
) -> Result<Json<ApiResponse<Vec<IndicatorAccuracy>>>> {
    let filter = query.to_filter()?;
    let ranked = state.reporter.indicator_report(filter).await?;
    Ok(Json(ApiResponse::list(ranked)))
}

/// Most recent stored predictions.
async fn get_predictions(
    State(state): State<AppState>,
    Query(query): Query<PredictionsQuery>,
) -> Result<Json<ApiResponse<Vec<PredictionRecord>>>> {
    let status = query.status()?;
    let limit = query.limit();
    let records = state
        .store
        .run_blocking(move |s| s.list_recent(status, limit))
        .await?;
    Ok(Json(ApiResponse::list(records)))
}

/// Run one verification pass immediately.
async fn verify_now(State(state): State<AppState>) -> Result<Json<ApiResponse<VerificationSummary>>> {
    let summary = state.verifier.run(&state.shutdown).await?;
    Ok(Json(ApiResponse::new(summary)))
}
