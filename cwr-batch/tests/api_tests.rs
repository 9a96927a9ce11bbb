//! HTTP API Tests
//!
//! Test File: api_tests.rs
//! Requirements: health, batch control endpoints, context registration,
//! plugin catalog proxy

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use cwr_batch::services::{build_http_client, PluginCatalog};
use cwr_batch::{build_router, AppState};
use helpers::{coordinates_payload, harness, records, Gate, Harness, RecordingPersistence, ScriptedTransport};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(h: &Harness, catalog_url: &str) -> Router {
    let client = build_http_client().unwrap();
    let catalog = std::sync::Arc::new(PluginCatalog::new(client.clone(), catalog_url));
    let state = AppState::new(
        h.orchestrator.clone(),
        catalog,
        h.event_bus.clone(),
        h.topology.clone(),
        client,
    );
    build_router(state)
}

fn default_app(h: &Harness) -> Router {
    app(h, "http://127.0.0.1:9")
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn start_body(n: i64, plugin: &str) -> Value {
    json!({ "records": records(n), "pluginName": plugin, "options": { "autoSave": false } })
}

async fn wait_until_idle(app: &Router) -> Value {
    for _ in 0..100 {
        let (_, status) = send(app, "GET", "/batch/status", None).await;
        if status["running"] == false && !status["endedAt"].is_null() {
            return status;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("batch run did not finish");
}

/// TC-API-001: Health endpoint reports module and idle state
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn test_health() {
    let h = harness(ScriptedTransport::detecting(&[], json!({})), RecordingPersistence::succeeding());
    let app = default_app(&h);

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cwr-batch");
    assert_eq!(body["batch_running"], false);
    assert!(body.get("last_error").is_none());
}

/// TC-API-002: Start returns 202, the run completes, rows are listed
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn test_start_status_rows() {
    // Given
    let h = harness(
        ScriptedTransport::detecting(&[2], coordinates_payload()),
        RecordingPersistence::succeeding(),
    );
    let app = default_app(&h);

    // When
    let (status, body) = send(&app, "POST", "/batch/start", Some(start_body(3, "caesar"))).await;

    // Then
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["pluginName"], "caesar");
    assert_eq!(body["total"], 3);
    assert!(body["runId"].is_string());

    let final_status = wait_until_idle(&app).await;
    assert_eq!(final_status["cursor"], 3);
    assert_eq!(final_status["percentage"], 100.0);
    assert_eq!(final_status["detected"], 1);
    assert_eq!(final_status["runId"], body["runId"]);

    let (_, rows) = send(&app, "GET", "/batch/rows", None).await;
    let rows = rows["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["status"], "detected");
    assert_eq!(rows[1]["coordinates"]["ddm"], "N 49° 45.558 E 005° 58.554");
    assert_eq!(rows[0]["status"], "not-detected");
}

/// TC-API-003: Second start while running is 409, stop ends the run
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn test_conflict_and_stop() {
    // Given: a run held on its first record
    let gate = Gate::new(1);
    let h = harness(
        ScriptedTransport::detecting(&[], json!({})).gated(gate.clone()),
        RecordingPersistence::succeeding(),
    );
    let app = default_app(&h);
    let (status, _) = send(&app, "POST", "/batch/start", Some(start_body(4, "caesar"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    gate.entered.notified().await;

    // When: another start arrives
    let (status, body) = send(&app, "POST", "/batch/start", Some(start_body(1, "rot13"))).await;

    // Then
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // When: stop, then let the in-flight record finish
    let (status, body) = send(&app, "POST", "/batch/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopRequested"], true);
    assert_eq!(body["total"], 4);
    gate.release.notify_one();

    // Then: only the in-flight record produced a row
    let final_status = wait_until_idle(&app).await;
    assert_eq!(final_status["stopped"], true);
    assert_eq!(final_status["cursor"], 1);
}

/// TC-API-004: Invalid start requests are 400
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_start_validation() {
    let h = harness(ScriptedTransport::detecting(&[], json!({})), RecordingPersistence::succeeding());
    let app = default_app(&h);

    let (status, body) = send(&app, "POST", "/batch/start", Some(start_body(0, "caesar"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(&app, "POST", "/batch/start", Some(start_body(2, ""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A name that would escape the execute path segment
    let (status, body) = send(
        &app,
        "POST",
        "/batch/start",
        Some(start_body(2, "../../geocaches/5/coordinates?")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("Invalid plugin name"));
}

/// TC-API-005: Manual save endpoint
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_manual_save_endpoint() {
    let h = harness(
        ScriptedTransport::detecting(&[1], coordinates_payload()),
        RecordingPersistence::succeeding(),
    );
    let app = default_app(&h);
    send(&app, "POST", "/batch/start", Some(start_body(2, "caesar"))).await;
    wait_until_idle(&app).await;

    let (status, body) = send(&app, "POST", "/batch/rows/1/save", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.persistence.saves().len(), 1);

    let (status, _) = send(&app, "POST", "/batch/rows/404/save", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/batch/rows/2/save", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// TC-API-006: Nested context registration
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_context_registration() {
    let h = harness(ScriptedTransport::detecting(&[], json!({})), RecordingPersistence::succeeding());
    let app = default_app(&h);

    let (status, body) = send(
        &app,
        "POST",
        "/contexts",
        Some(json!({ "url": "http://127.0.0.1:7000/messages" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["nestedContexts"], 1);

    let (status, _) = send(&app, "POST", "/contexts", Some(json!({ "url": "ftp://nope" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/contexts", None).await;
    assert_eq!(body["embedded"], false);
    assert_eq!(body["nested"], json!(["webhook:http://127.0.0.1:7000/messages"]));
    assert_eq!(body["directReceiver"], true);
}

/// TC-API-007: Plugin listing proxies the backend catalog
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_plugins_listing() {
    let backend = helpers::FakeBackend::start().await;
    backend.set_catalog(200, r#"[{"name":"caesar"},{"name":"metasolver"}]"#);
    let h = harness(ScriptedTransport::detecting(&[], json!({})), RecordingPersistence::succeeding());
    let app = app(&h, &backend.base_url);

    let (status, body) = send(&app, "GET", "/plugins", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[1]["name"], "metasolver");
}

/// TC-API-008: Unreachable catalog is 502 and recorded as last error
/// **Type:** Integration Test | **Priority:** P2
#[tokio::test]
async fn test_plugins_unavailable() {
    let h = harness(ScriptedTransport::detecting(&[], json!({})), RecordingPersistence::succeeding());
    let app = app(&h, &helpers::unreachable_url().await);

    let (status, body) = send(&app, "GET", "/plugins", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert!(health["last_error"].as_str().unwrap().contains("unavailable"));
}

/// TC-API-009: Re-registering a context does not duplicate it; DELETE removes it
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_context_unregistration() {
    let h = harness(ScriptedTransport::detecting(&[], json!({})), RecordingPersistence::succeeding());
    let app = default_app(&h);
    let url = json!({ "url": "http://127.0.0.1:7000/messages" });

    // Given: the same context registered twice
    send(&app, "POST", "/contexts", Some(url.clone())).await;
    let (status, body) = send(&app, "POST", "/contexts", Some(url.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["nestedContexts"], 1);

    // When / Then: the first delete removes it, the second finds nothing
    let (status, _) = send(&app, "DELETE", "/contexts", Some(url.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", "/contexts", Some(url)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/contexts", None).await;
    assert_eq!(body["nested"], json!([]));
}

/// TC-API-010: Detected coordinates are kept per record by the direct receiver
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_coordinates_listing() {
    // Given
    let h = harness(
        ScriptedTransport::detecting(&[2], coordinates_payload()),
        RecordingPersistence::succeeding(),
    );
    let app = default_app(&h);

    // When: a run detects a coordinate on record 2 only
    send(&app, "POST", "/batch/start", Some(start_body(3, "caesar"))).await;
    wait_until_idle(&app).await;

    // Then
    let (status, body) = send(&app, "GET", "/coordinates", None).await;
    assert_eq!(status, StatusCode::OK);
    let coordinates = body["coordinates"].as_array().unwrap();
    assert_eq!(coordinates.len(), 1);
    assert_eq!(coordinates[0]["recordId"], 2);
    assert!((coordinates[0]["latitude"].as_f64().unwrap() - 49.7593).abs() < 1e-4);

    let (status, _) = send(&app, "GET", "/coordinates/2", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/coordinates/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
