//! Signal service: computes, reports and records signals.

use super::aggregator::{Aggregator, EntryGate};
use super::policy::{outlook, VotePolicy};
use super::snapshot::SnapshotBuilder;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::SqliteStore;
use crate::sources::MarketData;
use crate::types::{
    AggregationMode, Decision, NewPrediction, OhlcPoint, SignalReport, Timeframe,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns candles into a voted signal and stores it as a prediction.
pub struct SignalService {
    market: Arc<dyn MarketData>,
    store: Arc<SqliteStore>,
    snapshots: SnapshotBuilder,
    policy: VotePolicy,
    aggregator: Aggregator,
    gate: EntryGate,
    adx_trend: f64,
    candle_limit: usize,
}

impl SignalService {
    pub fn new(config: &Config, market: Arc<dyn MarketData>, store: Arc<SqliteStore>) -> Arc<Self> {
        let snapshots = SnapshotBuilder::new(config.indicators.clone());
        let policy = VotePolicy::new(config.enabled_indicators.clone(), config.thresholds.clone());
        debug!(
            "Voting with {}",
            policy
                .enabled()
                .iter()
                .map(|name| name.label())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Arc::new(Self {
            market,
            store,
            snapshots,
            policy,
            aggregator: Aggregator::new(&config.aggregation),
            gate: EntryGate::new(
                config.aggregation.gate_ratio,
                config.aggregation.gate_conditions.clone(),
                config.thresholds.rsi_oversold,
            ),
            adx_trend: config.thresholds.adx_trend,
            candle_limit: config.candle_limit,
        })
    }

    pub fn required_candles(&self) -> usize {
        self.snapshots.required_candles()
    }

    /// Compute a report from candles without storing anything.
    pub fn evaluate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[OhlcPoint],
    ) -> Result<SignalReport> {
        let snapshot = self.snapshots.build(candles)?;
        let votes = self.policy.votes(&snapshot);
        let aggregation = self.aggregator.aggregate(&votes);
        // Weights can turn a LONG vote majority into a SHORT decision; no alert then.
        let entry_alert =
            aggregation.decision == Decision::Long && self.gate.fires(&votes, &snapshot);

        Ok(SignalReport {
            symbol: symbol.to_uppercase(),
            timeframe,
            timestamp: Utc::now(),
            close: snapshot.close,
            prev_close: snapshot.prev_close,
            indicators: snapshot.readings(),
            votes,
            long_votes: aggregation.long_votes,
            short_votes: aggregation.short_votes,
            decision: aggregation.decision,
            mode: self.aggregator.mode(),
            score: aggregation.score,
            entry_alert,
            outlook: outlook(&snapshot, self.adx_trend),
            prediction_id: None,
            storage_error: None,
        })
    }

    /// Fetch candles, compute the signal and append it to the prediction log.
    ///
    /// A storage failure does not fail the request: the report comes back with
    /// `storage_error` set and no `prediction_id`.
    pub async fn generate(&self, symbol: &str, timeframe: Timeframe) -> Result<SignalReport> {
        let candles = self
            .market
            .klines(symbol, timeframe, self.candle_limit)
            .await
            .map_err(|e| {
                AppError::DataUnavailable(format!("candle fetch for {} failed: {}", symbol, e))
            })?;

        debug!(
            "Computing {} signal for {} from {} candles",
            timeframe,
            symbol,
            candles.len()
        );

        let mut report = self.evaluate(symbol, timeframe, &candles).map_err(|e| match e {
            AppError::DataUnavailable(msg) => {
                AppError::DataUnavailable(format!("{} {}: {}", symbol.to_uppercase(), timeframe, msg))
            }
            other => other,
        })?;

        let mut prediction = NewPrediction::new(
            &report.symbol,
            timeframe,
            report.close,
            report.decision,
            report.votes.clone(),
        )
        .at(report.timestamp);
        if self.aggregator.mode() == AggregationMode::Weighted {
            prediction = prediction.with_weights(self.aggregator.weights().clone());
        }

        match self.store.run_blocking(move |s| s.append(&prediction)).await {
            Ok(id) => {
                info!(
                    "Signal {} {}: {} ({} LONG / {} SHORT), prediction {}",
                    report.symbol,
                    timeframe,
                    report.decision,
                    report.long_votes,
                    report.short_votes,
                    id
                );
                report.prediction_id = Some(id);
            }
            Err(e) => {
                warn!("Signal for {} computed but not stored: {}", report.symbol, e);
                report.storage_error = Some(e.to_string());
            }
        }

        if report.entry_alert {
            info!("Entry alert for {}: strong LONG consensus", report.symbol);
        }

        Ok(report)
    }
}
