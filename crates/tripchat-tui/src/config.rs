use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, anyhow};
use tripchat_core::RevealConfig;

pub const SERVER_URL_ENV: &str = "TRIPCHAT_SERVER_URL";
pub const TIMEOUT_ENV: &str = "TRIPCHAT_TIMEOUT_SECS";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub chars_per_tick: usize,
    pub tick_interval_ms: u64,
    /// Rows from the bottom that still count as "at the bottom".
    pub scroll_threshold_rows: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 60,
            chars_per_tick: 3,
            tick_interval_ms: 10,
            scroll_threshold_rows: 3,
        }
    }

    /// Load the config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(&config_path)?;
            serde_json::from_str(&config_content)?
        } else {
            // Write the defaults so there is a file to edit
            let config = Self::new();
            if let Err(e) = config.save() {
                tracing::warn!("could not write default config: {}", e);
            }
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.server_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => tracing::warn!(value = %secs, "ignoring invalid {}", TIMEOUT_ENV),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn reveal_config(&self) -> RevealConfig {
        RevealConfig {
            chars_per_tick: self.chars_per_tick.max(1),
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            scroll_threshold: self.scroll_threshold_rows,
        }
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("tripchat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::new();
        config.apply_overrides(env(&[
            (SERVER_URL_ENV, "https://trips.example.com"),
            (TIMEOUT_ENV, "15"),
        ]));
        assert_eq!(config.server_url, "https://trips.example.com");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_timeout_is_ignored() {
        let mut config = Config::new();
        config.apply_overrides(env(&[(TIMEOUT_ENV, "soon"), (SERVER_URL_ENV, "  ")]));
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"chars_per_tick": 8}"#).unwrap();
        assert_eq!(config.chars_per_tick, 8);
        assert_eq!(config.server_url, "http://localhost:5000");
        assert_eq!(config.reveal_config().tick_interval, Duration::from_millis(10));
    }
}
