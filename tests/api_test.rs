//! HTTP surface, driven in-process through the router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{uptrend, FakeMarket};
use omen::services::{Shutdown, SqliteStore};
use omen::{api, AppState, Config};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, AppState) {
    let market = Arc::new(FakeMarket::new(uptrend(150)));
    market.set_price("BTCUSDT", 10_000.0);
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let state = AppState::new(Config::default(), store, market, Shutdown::new());
    (api::router().with_state(state.clone()), state)
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["predictions"], 0);
}

#[tokio::test]
async fn test_signal_endpoint_stores_prediction() {
    let (app, state) = app();
    let (status, body) = call(&app, "GET", "/api/signals/btcusdt?timeframe=60").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], "BTCUSDT");
    assert_eq!(body["data"]["timeframe"], "60");
    assert_eq!(body["data"]["decision"], "LONG");
    assert!(body["data"]["predictionId"].is_i64());
    assert_eq!(state.store.count().unwrap(), 1);

    let (status, body) = call(&app, "GET", "/api/signals/predictions?status=pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["decision"], "LONG");
}

#[tokio::test]
async fn test_bad_timeframe_is_400() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/signals/BTCUSDT?timeframe=7m").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_accuracy_without_data() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/signals/accuracy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overall"]["total"], 0);
    assert!(body["data"].get("accuracyPct").is_none());

    let (status, body) = call(&app, "GET", "/api/signals/accuracy/indicators").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 0);

    let (status, _) = call(&app, "GET", "/api/signals/accuracy?since=last-week").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_endpoint_leaves_young_predictions_pending() {
    let (app, _) = app();
    call(&app, "GET", "/api/signals/BTCUSDT").await;

    let (status, body) = call(&app, "POST", "/api/signals/verify").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], 0);
    assert_eq!(body["data"]["notDue"], 1);
}
