use super::gateway_harness::GatewayTestServer;
use gasoline::transport::stdio::{Backend, Forwarder, serve_lines};
use serde_json::{Value, json};
use tokio::io::BufReader;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is one JSON frame"))
        .collect()
}

#[tokio::test]
async fn health_check_requires_a_gasoline_health_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"service": "something-else"})))
        .mount(&upstream)
        .await;
    assert!(!Forwarder::new(upstream.uri(), "bridge").is_healthy().await);

    let server = GatewayTestServer::start().await;
    assert!(Forwarder::new(server.url(""), "bridge").is_healthy().await);
}

#[tokio::test]
async fn forward_sends_client_header_and_maps_204_to_silence() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("X-Gasoline-Client", "zed"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&upstream)
        .await;

    let forwarder = Forwarder::new(upstream.uri(), "zed");
    let answer = forwarder
        .forward(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .unwrap();
    assert!(answer.is_none());
}

#[tokio::test]
async fn upstream_failure_becomes_internal_error_for_requests() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&upstream)
        .await;

    let backend = Backend::Remote(Forwarder::new(upstream.uri(), "zed"));
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
    );
    let mut output = Vec::new();
    let stats = serve_lines(BufReader::new(input.as_bytes()), &mut output, &backend)
        .await
        .unwrap();

    let frames = lines(&output);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], 9);
    assert_eq!(frames[0]["error"]["code"], -32603);
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.responses, 1);
}

#[tokio::test]
async fn bridge_forwards_to_a_running_daemon_with_its_client_id() {
    let server = GatewayTestServer::start().await;
    let backend = Backend::Remote(Forwarder::new(server.url(""), "bridge-client"));

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18"}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"interact","arguments":{"action":"refresh"}}}"#,
        "\n",
    );
    let mut output = Vec::new();
    serve_lines(BufReader::new(input.as_bytes()), &mut output, &backend)
        .await
        .unwrap();

    let frames = lines(&output);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(frames[1]["id"], 2);

    let queued = server
        .daemon
        .pending
        .take_undispatched()
        .into_iter()
        .next()
        .expect("interact should queue a command");
    assert_eq!(queued.client_id, "bridge-client");
    assert_eq!(queued.kind, "refresh");
}
