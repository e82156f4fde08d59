use gasoline::config::Config;
use gasoline::daemon::Daemon;
use gasoline::transport::gateway::run_gateway_with_listener;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub struct GatewayTestServer {
    pub port: u16,
    pub daemon: Arc<Daemon>,
    client: reqwest::Client,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    _state_dir: TempDir,
}

impl GatewayTestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        let state_dir = TempDir::new().expect("temp state dir should be created");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral gateway listener should bind");
        let port = listener
            .local_addr()
            .expect("ephemeral gateway listener should expose local address")
            .port();

        let mut config = Config::default();
        config.config_path = state_dir.path().join("config.toml");
        config.state_dir = state_dir.path().display().to_string();
        config.gateway.port = port;
        configure(&mut config);

        let daemon = Arc::new(Daemon::new(config));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_gateway_with_listener(
            listener,
            Arc::clone(&daemon),
            shutdown.clone(),
        ));

        wait_until_gateway_ready(port).await;

        Self {
            port,
            daemon,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
            shutdown,
            handle,
            _state_dir: state_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    /// `path` with `params` percent-encoded into the query string.
    pub fn url_with(&self, path: &str, params: &[(&str, &str)]) -> String {
        url::Url::parse_with_params(&self.url(path), params)
            .expect("test url should parse")
            .to_string()
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST should reach the gateway")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self.post(path, body).await;
        let status = response.status();
        let body = response.json().await.expect("gateway should answer JSON");
        (status, body)
    }

    pub async fn get_json(&self, url: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .expect("GET should reach the gateway");
        let status = response.status();
        let body = response.json().await.expect("gateway should answer JSON");
        (status, body)
    }

    /// Push console entries through the extension ingest endpoint.
    pub async fn ingest_logs(&self, entries: Vec<Value>) -> (StatusCode, Value) {
        self.post_json("/logs", &json!({ "entries": entries })).await
    }

    /// POST one raw JSON-RPC frame to `/mcp` as `client_id`.
    pub async fn mcp_raw(&self, client_id: &str, frame: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/mcp"))
            .header("X-Gasoline-Client", client_id)
            .json(frame)
            .send()
            .await
            .expect("POST /mcp should reach the gateway")
    }

    pub async fn rpc(&self, client_id: &str, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let response = self.mcp_raw(client_id, &frame).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("/mcp should answer JSON");
        assert_eq!(body["id"], id);
        body
    }

    pub async fn call_tool(&self, client_id: &str, name: &str, arguments: Value) -> Value {
        self.rpc(
            client_id,
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        )
        .await
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

async fn wait_until_gateway_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await;
        if let Ok(response) = health
            && response.status() == StatusCode::OK
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("gateway did not become ready on port {port}");
}

/// Text blocks of a `tools/call` response.
pub fn text_blocks(response: &Value) -> Vec<String> {
    response["result"]["content"]
        .as_array()
        .expect("tools/call result should carry content")
        .iter()
        .filter_map(|block| block["text"].as_str().map(str::to_string))
        .collect()
}

/// The JSON body of the first `summary\n{json}` block.
pub fn payload(response: &Value) -> Value {
    text_blocks(response)
        .iter()
        .find_map(|text| {
            let (_, body) = text.split_once('\n')?;
            serde_json::from_str(body).ok()
        })
        .unwrap_or_else(|| panic!("no JSON block in {response}"))
}

pub fn log(level: &str, message: &str) -> Value {
    json!({"level": level, "message": message, "source": "console", "url": "http://localhost:3000/"})
}
