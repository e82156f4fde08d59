pub mod schema;

pub use schema::{
    CaptureConfig, Config, ExtensionConfig, GatewayConfig, IngestConfig, PendingConfig,
    ToolsConfig,
};
