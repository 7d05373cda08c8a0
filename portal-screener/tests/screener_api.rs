//! Integration tests for the screener HTTP API.
//!
//! Drives the axum router directly over an in-memory universe.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use portal_common::config::Config;
use portal_screener::data::{StaticProvider, StockRecord, UniverseProvider};
use portal_screener::{build_router, ScreenerState};

/// Universe with a spread of yields and P/E ratios, plus one record
/// with no data at all.
fn sample_universe() -> Vec<StockRecord> {
    let mut cement = StockRecord::new("1101", "Taiwan Cement");
    cement.dividend_yield = Some(3.0);
    cement.pe_ratio = Some(15.0);
    cement.price = Some(35.0);

    let mut telecom = StockRecord::new("2412", "Chunghwa Telecom");
    telecom.dividend_yield = Some(5.0);
    telecom.pe_ratio = Some(18.0);
    telecom.price = Some(120.0);

    let mut etf = StockRecord::new("0056", "Yuanta High Dividend");
    etf.dividend_yield = Some(7.0);
    etf.price = Some(34.0);

    let empty = StockRecord::new("9999", "No Data Corp");

    vec![cement, telecom, etf, empty]
}

fn numbered_universe(n: usize) -> Vec<StockRecord> {
    (0..n)
        .map(|i| {
            let mut r = StockRecord::new(format!("{:04}", i), format!("Stock {i}"));
            r.price = Some(10.0 + i as f64);
            r
        })
        .collect()
}

fn create_test_app(records: Vec<StockRecord>) -> Router {
    let provider = Arc::new(StaticProvider::new(records));
    create_app_with_provider(provider, None)
}

fn create_app_with_provider(
    provider: Arc<dyn UniverseProvider>,
    deadline: Option<Duration>,
) -> Router {
    let mut state = ScreenerState::with_provider(Config::default(), provider);
    if let Some(deadline) = deadline {
        state = state.with_deadline(deadline);
    }
    build_router(Arc::new(state))
}

/// Helper to make a JSON request.
async fn request_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(b) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    (status, json)
}

async fn post_screen(app: &Router, body: Value) -> (StatusCode, Value) {
    request_json(app, Method::POST, "/api/screener", Some(body)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(sample_universe());

    let (status, json) = request_json(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["market_data"], true);
    assert_eq!(json["service"], "portal-screener");
}

#[tokio::test]
async fn test_health_degrades_when_provider_is_down() {
    let provider = Arc::new(StaticProvider::new(sample_universe()).with_unhealthy());
    let app = create_app_with_provider(provider, None);

    let (status, json) = request_json(&app, Method::GET, "/health", None).await;

    // Endpoint stays reachable but reports the dead upstream
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["market_data"], false);
}

// ─────────────────────────────────────────────────────────────────────────────
// Screening
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_screen_filters_by_dividend_yield() {
    let app = create_test_app(sample_universe());

    let (status, json) = post_screen(
        &app,
        json!({"criteria": {"dividend_yield": {"op": ">=", "value": 5}}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["total_count"], 2);

    let codes: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["code"].as_str().unwrap())
        .collect();
    // Strongest pass first; the no-data record is excluded outright
    assert_eq!(codes, vec!["0056", "2412"]);

    // Applied criteria are echoed back
    assert_eq!(json["criteria"][0]["field"], "dividend_yield");
    assert_eq!(json["criteria"][0]["op"], ">=");
}

#[tokio::test]
async fn test_empty_criteria_returns_universe_head() {
    let app = create_test_app(numbered_universe(50));

    let (status, json) = post_screen(&app, json!({"criteria": {}})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_count"], 50);
    assert_eq!(json["results"].as_array().unwrap().len(), 30);
    // Provider order, from the first symbol
    assert_eq!(json["results"][0]["code"], "0000");
}

#[tokio::test]
async fn test_unknown_fields_behave_like_empty_criteria() {
    let app = create_test_app(numbered_universe(10));

    let (_, with_unknown) = post_screen(
        &app,
        json!({"criteria": {"rsi": {"op": ">=", "value": 70}, "magic": 5}}),
    )
    .await;
    let (_, empty) = post_screen(&app, json!({"criteria": {}})).await;

    assert_eq!(with_unknown["total_count"], empty["total_count"]);
    assert_eq!(with_unknown["results"], empty["results"]);
    // Nothing recognized survived normalization
    assert_eq!(with_unknown["criteria"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_screen_with_preset_strategy() {
    let app = create_test_app(sample_universe());

    let (status, json) = post_screen(&app, json!({"strategy": "high_dividend"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    // Only 2412 carries both yield >= 5 and a P/E within bounds;
    // 0056 has no P/E on record, so the fail-closed rule excludes it
    assert_eq!(json["total_count"], 1);
    assert_eq!(json["results"][0]["code"], "2412");
}

#[tokio::test]
async fn test_screen_unknown_strategy_is_404() {
    let app = create_test_app(sample_universe());

    let (status, json) = post_screen(&app, json!({"strategy": "moonshot"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("moonshot"));
}

#[tokio::test]
async fn test_screen_times_out_with_408() {
    let provider = Arc::new(
        StaticProvider::new(numbered_universe(40))
            .with_fetch_delay(Duration::from_millis(50)),
    );
    let app = create_app_with_provider(provider, Some(Duration::from_millis(30)));

    let (status, json) = post_screen(&app, json!({"criteria": {}})).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("too long"));
}

#[tokio::test]
async fn test_malformed_body_gets_error_envelope() {
    let app = create_test_app(sample_universe());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/screener")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    assert!(status.is_client_error());

    // Even a body that never deserialized answers with the standard
    // JSON envelope, not a plain-text rejection
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert!(json["timestamp"].as_str().is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_strategies() {
    let app = create_test_app(sample_universe());

    let (status, json) = request_json(&app, Method::GET, "/api/screener/strategies", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let strategies = json["strategies"].as_array().unwrap();
    assert_eq!(strategies[0]["id"], "high_dividend");
    assert!(strategies
        .iter()
        .all(|s| !s["criteria"].as_array().unwrap().is_empty()));
}
