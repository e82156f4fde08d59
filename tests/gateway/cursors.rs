use super::gateway_harness::{GatewayTestServer, log, payload};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn ingest_numbered(server: &GatewayTestServer, range: std::ops::RangeInclusive<u32>) {
    let entries = range.map(|i| log("info", &format!("msg-{i}"))).collect();
    let (status, _) = server.ingest_logs(entries).await;
    assert_eq!(status, StatusCode::OK);
}

fn messages(entries: &Value) -> Vec<String> {
    entries
        .as_array()
        .expect("entries should be an array")
        .iter()
        .map(|e| e["message"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn after_cursor_pages_are_stable_across_new_ingest() {
    let server = GatewayTestServer::start().await;
    ingest_numbered(&server, 1..=5).await;

    let (status, first) = server.get_json(&server.url_with("/logs", &[("limit", "2")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages(&first["entries"]), ["msg-4", "msg-5"]);
    assert_eq!(first["metadata"]["total"], 5);
    assert_eq!(first["metadata"]["has_more"], true);
    let mut cursor = first["metadata"]["next_cursor"].as_str().unwrap().to_string();

    ingest_numbered(&server, 6..=15).await;

    let mut seen = Vec::new();
    loop {
        let url = server.url_with("/logs", &[("after_cursor", &cursor), ("limit", "3")]);
        let (status, page) = server.get_json(&url).await;
        assert_eq!(status, StatusCode::OK);
        if page["entries"].as_array().unwrap().is_empty() {
            break;
        }
        seen.extend(messages(&page["entries"]));
        cursor = page["metadata"]["next_cursor"].as_str().unwrap().to_string();
    }

    let expected: Vec<String> = (6..=15).map(|i| format!("msg-{i}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn observe_tool_pages_with_the_same_cursors() {
    let server = GatewayTestServer::start().await;
    ingest_numbered(&server, 1..=4).await;

    let response = server
        .call_tool("cursor-test", "observe", json!({"what": "logs", "limit": 2}))
        .await;
    let data = payload(&response);
    assert_eq!(messages(&data["logs"]), ["msg-3", "msg-4"]);
    let cursor = data["metadata"]["next_cursor"].as_str().unwrap().to_string();

    ingest_numbered(&server, 5..=6).await;
    let response = server
        .call_tool(
            "cursor-test",
            "observe",
            json!({"what": "logs", "after_cursor": cursor}),
        )
        .await;
    assert_eq!(messages(&payload(&response)["logs"]), ["msg-5", "msg-6"]);
}

#[tokio::test]
async fn evicted_cursor_is_gone_unless_restart_requested() {
    let server = GatewayTestServer::start_with(|config| {
        config.capture.log_capacity = 5;
    })
    .await;
    ingest_numbered(&server, 1..=3).await;

    let (_, page) = server.get_json(&server.url_with("/logs", &[("limit", "3")])).await;
    let stale = page["metadata"]["prev_cursor"].as_str().unwrap().to_string();
    assert!(stale.ends_with(":1"));

    // Sequences 1..=8 are evicted; the oldest retained is 9.
    ingest_numbered(&server, 4..=13).await;

    let (status, body) = server
        .get_json(&server.url_with("/logs", &[("after_cursor", &stale)]))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "cursor_expired");
    assert_eq!(body["lost_entries"], 7);

    let url = server.url_with(
        "/logs",
        &[("after_cursor", &stale), ("restart_on_eviction", "true"), ("limit", "2")],
    );
    let (status, page) = server.get_json(&url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages(&page["entries"]), ["msg-9", "msg-10"]);
    assert_eq!(page["metadata"]["cursor_restarted"], true);
    assert_eq!(page["metadata"]["original_cursor"], stale.as_str());
    assert!(
        page["metadata"]["warning"]
            .as_str()
            .unwrap()
            .contains("Lost entries: 1 to 8")
    );

    let response = server
        .call_tool("cursor-test", "observe", json!({"what": "logs", "after_cursor": stale}))
        .await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(payload(&response)["error"], "cursor_expired");
}

#[tokio::test]
async fn malformed_cursor_is_a_bad_request() {
    let server = GatewayTestServer::start().await;
    let (status, body) = server
        .get_json(&server.url_with("/logs", &[("after_cursor", "not-a-cursor")]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_cursor");
}
