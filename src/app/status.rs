use gasoline::config::Config;
use gasoline::diagnostics::Liveness;
use serde_json::Value;
use std::time::Duration;

const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> anyhow::Result<T> {
    let response = client
        .get(url)
        .timeout(STATUS_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json::<T>().await?)
}

pub async fn render_status(config: &Config, port: u16) -> String {
    let base = format!("http://{}:{port}", config.gateway.host);
    let client = reqwest::Client::new();

    let mut lines = vec![
        "◆ gasoline status".to_string(),
        String::new(),
        format!("  Version      {}", env!("CARGO_PKG_VERSION")),
        format!("  Config       {}", config.config_path.display()),
        format!("  State dir    {}", config.state_dir_path().display()),
        format!("  Endpoint     {base}"),
        String::new(),
    ];

    let liveness = match get_json::<Liveness>(&client, &format!("{base}/health")).await {
        Ok(liveness) => liveness,
        Err(e) => {
            tracing::debug!(error = %e, "status request failed");
            lines.push("  Daemon       not running".into());
            lines.push(format!("               start it with `gasoline serve --port {port}`"));
            return lines.join("\n");
        }
    };
    lines.push(format!(
        "  Daemon       running (pid {}, v{}, up {}s)",
        liveness.pid, liveness.version, liveness.uptime_seconds
    ));

    match get_json::<Value>(&client, &format!("{base}/v4/health")).await {
        Ok(health) => {
            let circuit = if health["circuit_open"].as_bool().unwrap_or(false) {
                format!(
                    "open ({})",
                    health["reason"].as_str().unwrap_or("unknown reason")
                )
            } else {
                "closed".to_string()
            };
            lines.push(format!("  Circuit      {circuit}"));
            lines.push(format!(
                "  Rate         {} / {} events per window",
                health["current_rate"], health["threshold"]
            ));
            lines.push(format!("  Memory       {} bytes", health["memory_bytes"]));
            if let Some(sizes) = health["buffer_sizes"].as_object() {
                lines.push("  Buffers".into());
                for (name, count) in sizes {
                    lines.push(format!("    {name:<16}{count}"));
                }
            }
        }
        Err(e) => lines.push(format!("  Ingest       unavailable ({e})")),
    }

    lines.join("\n")
}
