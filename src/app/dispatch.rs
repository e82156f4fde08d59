use crate::app::status::render_status;
use crate::cli::commands::{Cli, Commands};
use anyhow::Result;
use gasoline::Config;
use gasoline::daemon::{Daemon, join_task};
use gasoline::diagnostics::LifecycleEvent;
use gasoline::transport::{gateway, stdio};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the daemon until Ctrl-C, then record the shutdown.
async fn serve(config: Config, host: String, port: u16) -> Result<()> {
    let daemon = Arc::new(Daemon::new(config));
    daemon.check_state_dir();
    daemon.record_lifecycle(
        LifecycleEvent::DaemonStart,
        json!({ "host": host, "port": port }),
    );

    let shutdown = CancellationToken::new();
    let background = daemon.spawn_background(shutdown.clone());
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
        }
        signal.cancel();
    });

    let served = gateway::run_gateway(&host, port, Arc::clone(&daemon), shutdown.clone()).await;
    shutdown.cancel();
    join_task("reaper", background).await;

    daemon.record_lifecycle(LifecycleEvent::DaemonShutdown, daemon.shutdown_stats());
    info!(uptime_seconds = daemon.uptime_seconds(), "daemon stopped");
    served
}

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting gasoline on {host} (random port)");
            } else {
                info!("Starting gasoline on {host}:{port}");
            }
            serve(config, host, port).await
        }

        Commands::Stdio { client_id, port } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let client_id = client_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| config.client_id.clone());
            stdio::run_stdio(config, client_id).await
        }

        Commands::Status { port } => {
            let port = port.unwrap_or(config.gateway.port);
            println!("{}", render_status(&config, port).await);
            Ok(())
        }
    }
}
