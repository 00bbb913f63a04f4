//! Omen - rule-based crypto signal voting with delayed accuracy verification

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use std::sync::Arc;

pub use config::Config;
pub use error::{AppError, Result};
pub use types::*;

use services::{AccuracyReporter, Shutdown, SignalService, SqliteStore, Verifier};

/// Application state shared across handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub signal_service: Arc<SignalService>,
    pub verifier: Arc<Verifier>,
    pub reporter: Arc<AccuracyReporter>,
    pub shutdown: Shutdown,
}

impl AppState {
    /// Wire every service around one store and one market data source.
    pub fn new(
        config: Config,
        store: Arc<SqliteStore>,
        market: Arc<dyn sources::MarketData>,
        shutdown: Shutdown,
    ) -> Self {
        let signal_service = SignalService::new(&config, market.clone(), store.clone());
        let verifier = Verifier::new(store.clone(), market, config.verification_horizon());
        let reporter = AccuracyReporter::new(store.clone());

        Self {
            config: Arc::new(config),
            store,
            signal_service,
            verifier,
            reporter,
            shutdown,
        }
    }
}
