//! Delayed verification of stored predictions against the market price.

use crate::error::{AppError, Result};
use crate::services::scheduler::Shutdown;
use crate::services::SqliteStore;
use crate::sources::MarketData;
use crate::types::{Decision, PredictionRecord};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counts from one verification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    /// Records labelled in this pass.
    pub verified: usize,
    /// Pending records younger than the horizon.
    pub not_due: usize,
    /// Due records left pending because the price or the write failed.
    pub failed: usize,
    /// Set when shutdown stopped the pass early.
    pub interrupted: bool,
}

/// Labels due predictions with the realized direction.
pub struct Verifier {
    store: Arc<SqliteStore>,
    market: Arc<dyn MarketData>,
    horizon: Duration,
}

impl Verifier {
    pub fn new(store: Arc<SqliteStore>, market: Arc<dyn MarketData>, horizon: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            market,
            horizon,
        })
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    pub async fn run(&self, shutdown: &Shutdown) -> Result<VerificationSummary> {
        self.run_at(Utc::now(), shutdown).await
    }

    /// Verify every record that is at least one horizon old at `now`.
    ///
    /// Each symbol's price is fetched once per pass. A record whose price cannot be
    /// fetched stays pending for the next pass.
    pub async fn run_at(&self, now: DateTime<Utc>, shutdown: &Shutdown) -> Result<VerificationSummary> {
        let pending = self.store.run_blocking(|s| s.list_unverified()).await?;
        let horizon = self.horizon;
        let (due, waiting): (Vec<PredictionRecord>, Vec<PredictionRecord>) =
            pending.into_iter().partition(|r| r.is_due(now, horizon));

        let mut summary = VerificationSummary {
            not_due: waiting.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return Ok(summary);
        }

        let mut prices: HashMap<String, Option<f64>> = HashMap::new();

        for record in due {
            if shutdown.is_triggered() {
                info!("Verification interrupted by shutdown, remaining records stay pending");
                summary.interrupted = true;
                break;
            }

            let price = match prices.get(&record.symbol) {
                Some(cached) => *cached,
                None => {
                    let fetched = match self.market.last_price(&record.symbol).await {
                        Ok(price) => Some(price),
                        Err(e) => {
                            warn!("Price fetch for {} failed: {}", record.symbol, e);
                            None
                        }
                    };
                    prices.insert(record.symbol.clone(), fetched);
                    fetched
                }
            };

            let Some(price) = price else {
                summary.failed += 1;
                continue;
            };

            let actual = Decision::from_price_move(record.reference_price, price);
            let id = record.id;
            match self
                .store
                .run_blocking(move |s| s.set_actual(id, actual, price, now))
                .await
            {
                Ok(()) => {
                    debug!(
                        "Prediction {} ({} {}) at {} -> {} ({})",
                        id, record.symbol, record.decision, record.reference_price, price, actual
                    );
                    summary.verified += 1;
                }
                Err(AppError::AlreadyVerified(_)) => {
                    debug!("Prediction {} was verified concurrently", id);
                }
                Err(e) => {
                    warn!("Could not store outcome for prediction {}: {}", id, e);
                    summary.failed += 1;
                }
            }
        }

        if summary.verified > 0 || summary.failed > 0 {
            info!(
                "Verification pass: {} verified, {} failed, {} not yet due",
                summary.verified, summary.failed, summary.not_due
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewPrediction, OhlcPoint, Timeframe};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedPrice {
        prices: Mutex<HashMap<String, f64>>,
        calls: AtomicUsize,
    }

    impl FixedPrice {
        fn new(pairs: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                prices: Mutex::new(pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketData for FixedPrice {
        async fn klines(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<OhlcPoint>> {
            Ok(Vec::new())
        }

        async fn last_price(&self, symbol: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prices
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .ok_or_else(|| AppError::ExternalApi("down".to_string()))
        }
    }

    fn setup(market: Arc<FixedPrice>) -> (Arc<SqliteStore>, Arc<Verifier>) {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let verifier = Verifier::new(store.clone(), market, Duration::minutes(15));
        (store, verifier)
    }

    fn append(store: &SqliteStore, symbol: &str, decision: Decision, at: DateTime<Utc>) -> i64 {
        let p = NewPrediction::new(symbol, Timeframe::FifteenMinutes, 100.0, decision, vec![])
            .at(at);
        store.append(&p).unwrap()
    }

    #[tokio::test]
    async fn test_due_record_gets_actual() {
        let (store, verifier) = setup(FixedPrice::new(&[("BTCUSDT", 98.0)]));
        let t = Utc::now() - Duration::hours(1);
        let id = append(&store, "BTCUSDT", Decision::Long, t);

        let summary = verifier
            .run_at(t + Duration::minutes(16), &Shutdown::new())
            .await
            .unwrap();
        assert_eq!(summary.verified, 1);

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.actual, Some(Decision::Short));
        assert_eq!(record.is_hit(), Some(false));
        assert!(record.verified_at.unwrap() - record.timestamp >= verifier.horizon());
    }

    #[tokio::test]
    async fn test_young_record_untouched() {
        let (store, verifier) = setup(FixedPrice::new(&[("BTCUSDT", 98.0)]));
        let t = Utc::now();
        let id = append(&store, "BTCUSDT", Decision::Long, t);

        let summary = verifier
            .run_at(t + Duration::minutes(10), &Shutdown::new())
            .await
            .unwrap();
        assert_eq!(summary.verified, 0);
        assert_eq!(summary.not_due, 1);
        assert_eq!(store.list_unverified().unwrap()[0].id, id);
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let market = FixedPrice::new(&[("BTCUSDT", 101.0)]);
        let (store, verifier) = setup(market.clone());
        let t = Utc::now() - Duration::hours(2);
        append(&store, "BTCUSDT", Decision::Long, t);
        append(&store, "BTCUSDT", Decision::Short, t);

        let now = t + Duration::minutes(20);
        let first = verifier.run_at(now, &Shutdown::new()).await.unwrap();
        let after_first = store.list_verified(&Default::default()).unwrap();
        let second = verifier.run_at(now, &Shutdown::new()).await.unwrap();

        assert_eq!(first.verified, 2);
        assert_eq!(second.verified, 0);
        assert_eq!(store.list_verified(&Default::default()).unwrap(), after_first);
        // one fetch per symbol per pass, none when nothing is due
        assert_eq!(market.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_price_failure_leaves_record_pending() {
        let (store, verifier) = setup(FixedPrice::new(&[("BTCUSDT", 101.0)]));
        let t = Utc::now() - Duration::hours(1);
        append(&store, "ETHUSDT", Decision::Long, t);
        let btc = append(&store, "BTCUSDT", Decision::Long, t);

        let summary = verifier
            .run_at(t + Duration::minutes(30), &Shutdown::new())
            .await
            .unwrap();
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.failed, 1);

        let pending = store.list_unverified().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].symbol, "ETHUSDT");
        assert_eq!(store.get(btc).unwrap().unwrap().actual, Some(Decision::Long));
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_record() {
        let (store, verifier) = setup(FixedPrice::new(&[("BTCUSDT", 101.0)]));
        let t = Utc::now() - Duration::hours(1);
        append(&store, "BTCUSDT", Decision::Long, t);

        let shutdown = Shutdown::new();
        shutdown.trigger();
        let summary = verifier
            .run_at(t + Duration::minutes(30), &shutdown)
            .await
            .unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.verified, 0);
        assert_eq!(store.list_unverified().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_equal_price_is_neutral_actual() {
        let (store, verifier) = setup(FixedPrice::new(&[("BTCUSDT", 100.0)]));
        let t = Utc::now() - Duration::hours(1);
        let id = append(&store, "BTCUSDT", Decision::Short, t);

        verifier
            .run_at(t + Duration::minutes(15), &Shutdown::new())
            .await
            .unwrap();
        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.actual, Some(Decision::Neutral));
        assert_eq!(record.is_hit(), Some(false));
    }
}
