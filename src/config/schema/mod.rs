mod capture;
mod core;
mod gateway;
mod ingest;
mod tools;

pub use capture::CaptureConfig;
pub use self::core::{Config, ExtensionConfig, PendingConfig};
pub use gateway::GatewayConfig;
pub use ingest::IngestConfig;
pub use tools::ToolsConfig;
