//! HTTP API tests against the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use meter_ingestion::{
    create_router,
    health::HealthReporter,
    query::QueryService,
    store::{InMemoryMeterStore, MeterStore},
    AppState, FeedState, FeedStatus, IngestionWriter,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

struct TestApp {
    router: Router,
    store: Arc<InMemoryMeterStore>,
    feed: FeedStatus,
}

async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryMeterStore::new());
    store.ensure_schema().await.expect("schema");
    let feed = FeedStatus::new();

    let state = AppState {
        writer: IngestionWriter::new(store.clone()),
        queries: QueryService::new(store.clone()),
        health: HealthReporter::new(store.clone(), feed.clone()),
    };

    TestApp {
        router: create_router(state),
        store,
        feed,
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post_json(body: &str) -> Request<Body> {
    Request::post("/api/meter-data")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Write API
// =============================================================================

#[tokio::test]
async fn post_returns_created_reading() {
    let app = test_app().await;

    let (status, body) = send(&app.router, post_json(r#"{"meter_id":"M1","kwh":12.34}"#)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["meter_id"], "M1");
    assert_eq!(body["kwh"], 12.34);
    assert!(body["voltage"].is_null());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn post_with_missing_or_malformed_fields_is_bad_request() {
    let app = test_app().await;

    let (status, body) = send(&app.router, post_json(r#"{"kwh": 3.5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "meter_id is required");

    let (status, body) = send(&app.router, post_json(r#"{"meter_id": "M1", "kwh": "lots"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "kwh must be a finite number");

    let (status, body) = send(&app.router, post_json("{oops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("request body must be valid JSON"));

    assert!(app.store.list_recent(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn post_exceeding_column_limits_is_bad_request() {
    let app = test_app().await;

    let (status, body) = send(&app.router, post_json(r#"{"meter_id":"M1","kwh":123456789.5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "kwh must be less than 100000000 in magnitude");

    let long_id = json!({"meter_id": "x".repeat(300), "kwh": 1}).to_string();
    let (status, body) = send(&app.router, post_json(&long_id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "meter_id must be at most 255 characters");

    assert!(app.store.list_recent(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_is_generic_server_error() {
    let app = test_app().await;
    app.store.set_available(false);

    let (status, body) = send(&app.router, post_json(r#"{"meter_id":"M1","kwh":1}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Database operation failed"}));

    let (status, body) = send(&app.router, get("/api/meter-data")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Database operation failed");
}

// =============================================================================
// Read API
// =============================================================================

#[tokio::test]
async fn list_returns_newest_first() {
    let app = test_app().await;
    for kwh in [1.0, 2.0, 3.0] {
        let body = json!({"meter_id": "M1", "kwh": kwh}).to_string();
        let (status, _) = send(&app.router, post_json(&body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app.router, get("/api/meter-data")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let (_, body) = send(&app.router, get("/api/meter-data?limit=2")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn list_on_empty_store_is_empty_array() {
    let app = test_app().await;
    let (status, body) = send(&app.router, get("/api/meter-data")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn summary_averages_per_meter() {
    let app = test_app().await;
    for body in [
        r#"{"meter_id":"M1","kwh":10.00,"voltage":230}"#,
        r#"{"meter_id":"M1","kwh":20.00}"#,
        r#"{"meter_id":"M2","kwh":5.5}"#,
    ] {
        send(&app.router, post_json(body)).await;
    }

    let (status, body) = send(&app.router, get("/api/meter-data/summary")).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["meter_id"], "M1");
    assert_eq!(rows[0]["readings"], 2);
    assert_eq!(rows[0]["avg_kwh"], 15.0);
    assert_eq!(rows[0]["avg_voltage"], 230.0);
    assert!(rows[0]["last_reading"].is_string());
    assert_eq!(rows[1]["meter_id"], "M2");
    assert!(rows[1]["avg_voltage"].is_null());
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reflects_store_and_feed() {
    let app = test_app().await;

    let (status, body) = send(&app.router, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "degraded", "store_connected": true, "feed_connected": false})
    );

    app.feed.set(FeedState::Subscribed);
    let (_, body) = send(&app.router, get("/api/health")).await;
    assert_eq!(body["status"], "healthy");

    app.store.set_available(false);
    let (status, body) = send(&app.router, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store_connected"], false);
    assert_eq!(body["status"], "degraded");
}
