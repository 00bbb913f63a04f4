use crate::error::Result;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    predictions: usize,
    shutting_down: bool,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let predictions = state.store.run_blocking(|s| s.count()).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        predictions,
        shutting_down: state.shutdown.is_triggered(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
