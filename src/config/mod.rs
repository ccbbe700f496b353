use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Public Polkadot relay chain RPC.
pub const DEFAULT_WS_URL: &str = "wss://rpc.polkadot.io";
/// A node running locally with default ports.
pub const LOCAL_WS_URL: &str = "ws://127.0.0.1:9944";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for env var {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Websocket RPC endpoint of the node.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// How long to wait for the client to become ready.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Event sections to print, e.g. ["balances"].
    #[serde(default = "default_sections")]
    pub sections: Vec<String>,
    /// Observation window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_sections() -> Vec<String> {
    vec!["balances".to_string()]
}
fn default_window_secs() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sections: default_sections(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Defaults overlaid by environment variables (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("MONITOR_WS_URL") {
            self.node.ws_url = url;
        }
        if let Some(raw) = var("MONITOR_CONNECT_TIMEOUT_SECS") {
            self.node.connect_timeout_secs = parse_secs("MONITOR_CONNECT_TIMEOUT_SECS", raw)?;
        }
        if let Some(raw) = var("MONITOR_WINDOW_SECS") {
            self.monitor.window_secs = parse_secs("MONITOR_WINDOW_SECS", raw)?;
        }
        if let Some(raw) = var("MONITOR_SECTIONS") {
            self.monitor.sections = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.monitor.window_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.node.connect_timeout_secs)
    }
}

fn parse_secs(name: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv { name, value: raw })
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
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.node.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.monitor.sections, vec!["balances".to_string()]);
        assert_eq!(config.window(), Duration::from_millis(600_000));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [node]
            ws_url = "ws://127.0.0.1:9944"

            [monitor]
            sections = ["balances", "poe"]
            "#,
        )
        .unwrap();
        assert_eq!(config.node.ws_url, LOCAL_WS_URL);
        assert_eq!(config.node.connect_timeout_secs, 30);
        assert_eq!(config.monitor.sections, vec!["balances", "poe"]);
        assert_eq!(config.monitor.window_secs, 600);
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        assert!(matches!(
            Config::parse("[monitor]\nwindow_secs = \"ten\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("MONITOR_WS_URL", "ws://node:9944"),
                ("MONITOR_WINDOW_SECS", " 5 "),
                ("MONITOR_SECTIONS", "balances, system,,"),
            ]))
            .unwrap();
        assert_eq!(config.node.ws_url, "ws://node:9944");
        assert_eq!(config.monitor.window_secs, 5);
        assert_eq!(config.monitor.sections, vec!["balances", "system"]);
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("MONITOR_CONNECT_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: "MONITOR_CONNECT_TIMEOUT_SECS", .. }
        ));
    }
}
