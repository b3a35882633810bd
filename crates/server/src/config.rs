//! Server configuration: JSON file with defaults, overridable from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_players must be between 1 and 255, got {0}")]
    MaxPlayers(usize),
    #[error("level dimensions must each be between 1 and 32767, got {0}x{1}x{2}")]
    LevelSize(usize, usize, usize),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("outbound_queue must be greater than zero")]
    OutboundQueue,
    #[error("click_distance must be a positive number")]
    ClickDistance,
    #[error("main_level must not be empty")]
    MainLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub motd: String,
    pub bind: String,
    pub max_players: usize,
    /// Check the md5(salt + name) verification key on login.
    pub verify_names: bool,
    pub main_level: String,
    pub level_dir: PathBuf,
    /// Width, height, depth of a freshly generated main level.
    pub default_level_size: [usize; 3],
    pub dashboard_port: Option<u16>,
    pub tick_interval_ms: u64,
    pub keepalive_interval_secs: u64,
    pub autosave_interval_secs: u64,
    /// Frames that may queue per connection before the peer is dropped.
    pub outbound_queue: usize,
    pub click_distance: f64,
    pub operators: Vec<String>,
    pub default_permissions: Vec<String>,
    pub operator_permissions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Classic Server".into(),
            motd: "Welcome!".into(),
            bind: "0.0.0.0:25565".into(),
            max_players: 20,
            verify_names: false,
            main_level: "main".into(),
            level_dir: "levels".into(),
            default_level_size: [128, 64, 128],
            dashboard_port: None,
            tick_interval_ms: 100,
            keepalive_interval_secs: 2,
            autosave_interval_secs: 300,
            outbound_queue: 4096,
            click_distance: 5.0,
            operators: Vec::new(),
            default_permissions: Vec::new(),
            operator_permissions: vec!["*".into()],
        }
    }
}

impl ServerConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ServerConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=255).contains(&self.max_players) {
            return Err(ConfigError::MaxPlayers(self.max_players));
        }
        let [w, h, d] = self.default_level_size;
        if [w, h, d].iter().any(|&n| n == 0 || n > i16::MAX as usize) {
            return Err(ConfigError::LevelSize(w, h, d));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("tick_interval_ms"));
        }
        if self.keepalive_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("keepalive_interval_secs"));
        }
        if self.autosave_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("autosave_interval_secs"));
        }
        if self.outbound_queue == 0 {
            return Err(ConfigError::OutboundQueue);
        }
        if !(self.click_distance.is_finite() && self.click_distance > 0.0) {
            return Err(ConfigError::ClickDistance);
        }
        if self.main_level.is_empty() {
            return Err(ConfigError::MainLevel);
        }
        Ok(())
    }

    pub fn is_operator(&self, name: &str) -> bool {
        self.operators.iter().any(|op| op.eq_ignore_ascii_case(name))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ServerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"name": "Test", "max_players": 4}"#).unwrap();
        assert_eq!(config.name, "Test");
        assert_eq!(config.max_players, 4);
        assert_eq!(config.keepalive_interval_secs, 2);
        assert_eq!(config.click_distance, 5.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let config = ServerConfig {
            max_players: 300,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::MaxPlayers(300)));

        let config = ServerConfig {
            default_level_size: [0, 64, 64],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::LevelSize(0, 64, 64)));

        let config = ServerConfig {
            click_distance: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ClickDistance));
    }

    #[test]
    fn operator_lookup_ignores_case() {
        let config = ServerConfig {
            operators: vec!["Alice".into()],
            ..Default::default()
        };
        assert!(config.is_operator("alice"));
        assert!(!config.is_operator("bob"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("classic_server_missing_config.json");
        let _ = fs::remove_file(&path);
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.max_players, 20);
    }
}
