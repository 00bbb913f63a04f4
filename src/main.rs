use omen::services::{PeriodicTask, Shutdown, SqliteStore};
use omen::sources::BybitClient;
use omen::{api, AppError, AppState, Config};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Invalid configuration stops the process before anything is opened
    let config = Config::from_env()?;
    info!(
        "Starting Omen on {}:{} ({} mode, {} indicators, horizon {}s)",
        config.host,
        config.port,
        config.aggregation.mode.as_str(),
        config.enabled_indicators.len(),
        config.verification_horizon_secs
    );

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    info!(
        "Prediction store at {} ({} records)",
        config.database_path,
        store.count()?
    );

    let market = Arc::new(BybitClient::new(
        config.bybit_api_url.clone(),
        config.bybit_category.clone(),
    ));
    let shutdown = Shutdown::new();
    let state = AppState::new(config, store, market, shutdown.clone());
    let config = state.config.clone();

    // Auto-signal: one stored prediction per configured symbol per tick
    let signal_task = {
        let service = state.signal_service.clone();
        let symbols = config.symbols.clone();
        let timeframe = config.timeframe;
        PeriodicTask::new(
            "auto-signal",
            Duration::from_secs(config.scheduler.auto_signal_interval_secs),
        )
        .spawn(shutdown.clone(), move || {
            let service = service.clone();
            let symbols = symbols.clone();
            async move {
                for symbol in &symbols {
                    if let Err(e) = service.generate(symbol, timeframe).await {
                        warn!("Auto-signal for {} failed: {}", symbol, e);
                    }
                }
                Ok::<_, AppError>(())
            }
        })
    };

    let verify_task = {
        let verifier = state.verifier.clone();
        let shutdown_flag = shutdown.clone();
        PeriodicTask::new(
            "verify",
            Duration::from_secs(config.scheduler.verify_interval_secs),
        )
        .spawn(shutdown.clone(), move || {
            let verifier = verifier.clone();
            let shutdown_flag = shutdown_flag.clone();
            async move {
                verifier.run(&shutdown_flag).await?;
                Ok::<_, AppError>(())
            }
        })
    };

    let summary_task = {
        let reporter = state.reporter.clone();
        PeriodicTask::new(
            "daily-summary",
            Duration::from_secs(config.scheduler.summary_interval_secs),
        )
        .spawn(shutdown.clone(), move || {
            let reporter = reporter.clone();
            async move {
                reporter.log_summary(chrono::Duration::hours(24)).await?;
                Ok::<_, AppError>(())
            }
        })
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Omen server listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested");
            signal.trigger();
        })
        .await?;

    // Server is down; let background tasks finish their in-flight runs
    shutdown.trigger();
    for handle in [signal_task, verify_task, summary_task] {
        let (name, skipped) = (handle.name(), handle.skipped_ticks());
        handle.join().await;
        if skipped > 0 {
            info!("{} skipped {} ticks while busy", name, skipped);
        }
    }
    info!("Omen stopped");

    Ok(())
}
