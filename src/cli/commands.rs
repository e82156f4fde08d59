use clap::{Parser, Subcommand};

/// Gasoline - browser telemetry for AI coding assistants.
#[derive(Parser, Debug)]
#[command(name = "gasoline")]
#[command(version)]
#[command(
    about = "Captures browser console, network and user-action telemetry and serves it over MCP.",
    long_about = None
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon: extension ingest, queries and the /mcp endpoint
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (use 0 for a random available port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Speak MCP over stdin/stdout, forwarding to a running daemon when present
    Stdio {
        /// Identifier sent as X-Gasoline-Client (defaults to config or GASOLINE_CLIENT)
        #[arg(long)]
        client_id: Option<String>,

        /// Daemon port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show whether a daemon is running and its ingest health
    Status {
        /// Daemon port
        #[arg(short, long)]
        port: Option<u16>,
    },
}
