use super::gateway_harness::{GatewayTestServer, payload};
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn interact_round_trips_through_sync_and_command_result() {
    let server = GatewayTestServer::start().await;

    let response = server
        .call_tool("agent", "interact", json!({"action": "click", "selector": "#save"}))
        .await;
    let queued = payload(&response);
    assert_eq!(queued["status"], "queued");
    let correlation_id = queued["correlation_id"].as_str().unwrap().to_string();

    let response = server
        .call_tool(
            "agent",
            "observe",
            json!({"what": "command_result", "correlation_id": correlation_id}),
        )
        .await;
    assert_eq!(payload(&response)["status"], "pending");

    let (status, sync) = server
        .post_json("/sync", &json!({"session_id": "s-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sync["ack"], true);
    let commands = sync["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["correlation_id"], correlation_id.as_str());
    assert_eq!(commands[0]["type"], "click");
    assert_eq!(commands[0]["params"]["selector"], "#save");
    assert_eq!(sync["next_poll_ms"], 200);

    // Already handed out: the next sync carries nothing new.
    let (_, again) = server.post_json("/sync", &json!({})).await;
    assert!(again["commands"].as_array().unwrap().is_empty());

    let (status, body) = server
        .post_json(
            "/command-result",
            &json!({
                "correlation_id": correlation_id,
                "status": "complete",
                "result": {"clicked": true}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correlation_id"], correlation_id.as_str());

    let response = server
        .call_tool(
            "agent",
            "observe",
            json!({"what": "command_result", "correlation_id": correlation_id}),
        )
        .await;
    let outcome = payload(&response);
    assert_eq!(outcome["status"], "complete");
    assert_eq!(outcome["result"]["clicked"], true);

    // A settled command cannot be answered twice.
    let (status, _) = server
        .post_json(
            "/command-result",
            &json!({"correlation_id": correlation_id, "status": "complete"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn results_reported_inside_sync_are_applied() {
    let server = GatewayTestServer::start().await;
    let response = server
        .call_tool("agent", "interact", json!({"action": "refresh"}))
        .await;
    let correlation_id = payload(&response)["correlation_id"]
        .as_str()
        .unwrap()
        .to_string();

    server.post_json("/sync", &json!({})).await;
    let (status, _) = server
        .post_json(
            "/sync",
            &json!({
                "command_results": [
                    {"correlation_id": correlation_id, "error": "tab closed"}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = server
        .call_tool(
            "agent",
            "observe",
            json!({"what": "command_result", "correlation_id": correlation_id}),
        )
        .await;
    assert_eq!(response["result"]["isError"], true);
    let error = payload(&response);
    assert_eq!(error["error"], "extension_error");
    assert!(error["message"].as_str().unwrap().contains("tab closed"));
}

#[tokio::test]
async fn pilot_disabled_in_sync_settings_blocks_interact() {
    let server = GatewayTestServer::start().await;
    server
        .post_json(
            "/sync",
            &json!({
                "settings": {
                    "pilot_enabled": false,
                    "tracking_enabled": true,
                    "tracked_tab_id": 7,
                    "tracked_tab_url": "http://localhost:3000/"
                }
            }),
        )
        .await;

    let response = server
        .call_tool("agent", "interact", json!({"action": "refresh"}))
        .await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(payload(&response)["error"], "pilot_disabled");
    assert!(server.daemon.pending.take_undispatched().is_empty());
}

#[tokio::test]
async fn settled_result_is_gone_after_its_ttl() {
    let server = GatewayTestServer::start().await;

    let response = server
        .call_tool("agent", "analyze", json!({"what": "accessibility"}))
        .await;
    let queued = payload(&response);
    assert_eq!(queued["status"], "queued");
    let correlation_id = queued["correlation_id"].as_str().unwrap().to_string();

    let (status, _) = server
        .post_json(
            "/command-result",
            &json!({
                "correlation_id": correlation_id,
                "status": "complete",
                "result": {"violations": []}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let observe = json!({"what": "command_result", "correlation_id": correlation_id});
    let response = server.call_tool("agent", "observe", observe.clone()).await;
    assert_eq!(payload(&response)["status"], "complete");

    // Still inside the 60s retention window.
    let report = server
        .daemon
        .pending
        .reap_at(Instant::now() + Duration::from_secs(30));
    assert_eq!(report.removed, 0);

    let report = server
        .daemon
        .pending
        .reap_at(Instant::now() + Duration::from_secs(61));
    assert_eq!(report.removed, 1);

    let response = server.call_tool("agent", "observe", observe).await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(payload(&response)["error"], "no_data");
}
