use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let gasoline_dir = home.join(".gasoline");
        let config_path = gasoline_dir.join("config.toml");

        if !gasoline_dir.exists() {
            fs::create_dir_all(&gasoline_dir).context("Failed to create .gasoline directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject settings that would make a buffer or limiter unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, capacity) in self.capture.capacities() {
            if capacity == 0 {
                return Err(ConfigError::Validation(format!(
                    "capture.{name} must be greater than zero"
                )));
            }
        }
        if self.ingest.threshold == 0 {
            return Err(ConfigError::Validation(
                "ingest.threshold must be greater than zero".into(),
            ));
        }
        if self.ingest.window_ms == 0 {
            return Err(ConfigError::Validation(
                "ingest.window_ms must be greater than zero".into(),
            ));
        }
        if self.ingest.memory_soft_limit_bytes > self.ingest.memory_hard_limit_bytes {
            return Err(ConfigError::Validation(
                "ingest.memory_soft_limit_bytes must not exceed memory_hard_limit_bytes".into(),
            ));
        }
        if self.tools.max_calls == 0 || self.tools.window_secs == 0 {
            return Err(ConfigError::Validation(
                "tools.max_calls and tools.window_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
