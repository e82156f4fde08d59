use super::gateway_harness::{GatewayTestServer, log};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

fn burst(count: usize) -> Vec<Value> {
    (0..count).map(|i| log("info", &format!("burst {i}"))).collect()
}

#[tokio::test]
async fn over_threshold_batch_gets_429_with_retry_after() {
    let server = GatewayTestServer::start_with(|config| {
        config.ingest.threshold = 5;
        config.ingest.window_ms = 60_000;
    })
    .await;

    let (status, body) = server.ingest_logs(burst(3)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 3);
    assert_eq!(body["last_sequence"], 3);

    let response = server.post("/logs", &json!({ "entries": burst(3) })).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("429 should carry a numeric Retry-After");
    assert!(retry_after >= 1);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["threshold"], 5);
    assert_eq!(body["circuit_open"], false);
    assert!(body["retry_after_ms"].as_u64().unwrap() > 0);

    // The rejected batch is not stored.
    assert_eq!(server.daemon.capture.sizes().logs, 3);
}

#[tokio::test]
async fn default_threshold_admits_exactly_one_thousand_events_per_second() {
    let server = GatewayTestServer::start().await;

    let (status, body) = server.ingest_logs(burst(1000)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 1000);

    let response = server.post("/logs", &json!({ "entries": burst(1) })).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["retry_after_ms"], 1000);
    assert_eq!(body["threshold"], 1000);
    assert_eq!(server.daemon.capture.sizes().logs, 1000);
}

#[tokio::test]
async fn sustained_overload_opens_circuit_then_recovers() {
    let server = GatewayTestServer::start_with(|config| {
        config.ingest.threshold = 10;
        config.ingest.window_ms = 200;
        config.ingest.open_after_windows = 2;
        config.ingest.recovery_secs = 1;
    })
    .await;

    let mut last = Value::Null;
    for _ in 0..3 {
        let (status, body) = server.ingest_logs(burst(11)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        last = body;
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    assert_eq!(last["circuit_open"], true);

    let (status, health) = server.get_json(&server.url("/v4/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["circuit_open"], true);
    assert_eq!(health["reason"], "rate_exceeded");
    assert!(health["opened_at"].is_string());

    // While open even a tiny batch is refused.
    let (status, body) = server.ingest_logs(burst(1)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["circuit_open"], true);

    tokio::time::sleep(Duration::from_millis(1600)).await;

    let (_, health) = server.get_json(&server.url("/v4/health")).await;
    assert_eq!(health["circuit_open"], false);
    assert!(health["reason"].is_null());

    let (status, _) = server.ingest_logs(burst(1)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = GatewayTestServer::start_with(|config| {
        config.gateway.max_body_bytes = 1024;
    })
    .await;

    let big = "x".repeat(4096);
    let response = server
        .post("/logs", &json!({ "entries": [log("info", &big)] }))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(server.daemon.capture.sizes().logs, 0);
}

#[tokio::test]
async fn malformed_ingest_body_is_invalid_json() {
    let server = GatewayTestServer::start().await;
    let response = reqwest::Client::new()
        .post(server.url("/logs"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_json");
}
