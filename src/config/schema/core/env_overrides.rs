use super::Config;
use crate::telemetry::TelemetryMode;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port_str) = std::env::var("GASOLINE_PORT")
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) = std::env::var("GASOLINE_HOST")
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(state_dir) = std::env::var("GASOLINE_STATE_DIR")
            && !state_dir.is_empty()
        {
            self.state_dir = state_dir;
        }

        if let Ok(mode) = std::env::var("GASOLINE_TELEMETRY_MODE")
            && let Ok(mode) = mode.trim().parse::<TelemetryMode>()
        {
            self.tools.telemetry_mode = mode;
        }

        if let Ok(client) = std::env::var("GASOLINE_CLIENT")
            && !client.trim().is_empty()
        {
            self.client_id = client.trim().to_string();
        }
    }
}
