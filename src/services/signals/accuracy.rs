//! Accuracy statistics over verified predictions.
//!
//! A prediction is a hit when its decision equals the realized direction. NEUTRAL
//! decisions never enter the ratio; they are counted as skipped.

use crate::error::Result;
use crate::services::sqlite_store::PredictionFilter;
use crate::services::SqliteStore;
use crate::types::{AccuracyReport, AccuracyStats, IndicatorAccuracy, IndicatorName, PredictionRecord};
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Overall, per-timeframe and per-symbol accuracy of the given records.
///
/// Pending records are ignored.
pub fn summarize(records: &[PredictionRecord]) -> AccuracyReport {
    let mut overall = AccuracyStats::default();
    let mut by_timeframe: BTreeMap<String, AccuracyStats> = BTreeMap::new();
    let mut by_symbol: BTreeMap<String, AccuracyStats> = BTreeMap::new();

    for record in records.iter().filter(|r| !r.is_pending()) {
        let hit = record.is_hit();
        overall.record(hit);
        by_timeframe
            .entry(record.timeframe.to_string())
            .or_default()
            .record(hit);
        by_symbol
            .entry(record.symbol.clone())
            .or_default()
            .record(hit);
    }

    AccuracyReport {
        overall,
        accuracy_pct: overall.accuracy_pct(),
        by_timeframe,
        by_symbol,
        timestamp: Utc::now(),
    }
}

/// Accuracy of each indicator's own votes, canonical order. Indicators that never voted
/// on a verified record are left out.
pub fn by_indicator(records: &[PredictionRecord]) -> Vec<IndicatorAccuracy> {
    let mut stats: BTreeMap<IndicatorName, AccuracyStats> = BTreeMap::new();

    for record in records.iter().filter(|r| !r.is_pending()) {
        for vote in &record.votes {
            stats
                .entry(vote.indicator)
                .or_default()
                .record(record.indicator_hit(vote.indicator));
        }
    }

    stats
        .into_iter()
        .map(|(indicator, stats)| IndicatorAccuracy {
            indicator,
            stats,
            accuracy_pct: stats.accuracy_pct(),
        })
        .collect()
}

/// Indicators ranked by hit rate, best first. Ties keep canonical order.
pub fn leaderboard(records: &[PredictionRecord]) -> Vec<IndicatorAccuracy> {
    let mut ranked = by_indicator(records);
    ranked.sort_by(|a, b| {
        let a_pct = a.accuracy_pct.unwrap_or(-1.0);
        let b_pct = b.accuracy_pct.unwrap_or(-1.0);
        b_pct.total_cmp(&a_pct)
    });
    ranked
}

/// Reads verified records from the store and reports on them.
pub struct AccuracyReporter {
    store: Arc<SqliteStore>,
}

impl AccuracyReporter {
    pub fn new(store: Arc<SqliteStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }

    async fn verified(&self, filter: PredictionFilter) -> Result<Vec<PredictionRecord>> {
        self.store.run_blocking(move |s| s.list_verified(&filter)).await
    }

    pub async fn report(&self, filter: PredictionFilter) -> Result<AccuracyReport> {
        let records = self.verified(filter).await?;
        Ok(summarize(&records))
    }

    pub async fn indicator_report(&self, filter: PredictionFilter) -> Result<Vec<IndicatorAccuracy>> {
        let records = self.verified(filter).await?;
        Ok(leaderboard(&records))
    }

    /// Log accuracy and the indicator leaderboard for predictions made in the last `window`.
    pub async fn log_summary(&self, window: Duration) -> Result<AccuracyReport> {
        let filter = PredictionFilter {
            since: Some(Utc::now() - window),
            ..Default::default()
        };
        let records = self.verified(filter).await?;
        let report = summarize(&records);

        info!(
            "Accuracy over the last {}h: {} ({} neutral skipped)",
            window.num_hours(),
            report.overall,
            report.overall.skipped
        );
        for (timeframe, stats) in &report.by_timeframe {
            info!("  timeframe {}: {}", timeframe, stats);
        }
        for entry in leaderboard(&records) {
            info!("  {}: {}", entry.indicator, entry.stats);
        }
        Ok(report)
    }
}
