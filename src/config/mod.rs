//! Configuration model and loader.
//!
//! The router reads a single TOML file with two tables: `[servers]`, an
//! ordered list of upstream declarations, and `[config]`, the tuning knobs
//! that govern scraping, health checking, and forwarding. Reloads are
//! triggered by the config-watcher task on a fixed interval and diffed
//! against the live fleet by [`crate::core::router::Router::reload`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, RouterError};

/// One configured backend inference server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEntry {
    /// Base URL of the upstream, e.g. `http://10.0.0.1:8000`.
    pub url: String,
    /// Routing capacity hint; not an enforced semaphore.
    pub max_concurrent_requests: u32,
}

/// Tuning knobs for scraping, health checking, and forwarding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterTuning {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: f64,
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout: f64,
    #[serde(default = "default_min_success_rate")]
    pub health_check_min_success_rate: f64,
    #[serde(default = "default_max_response_time")]
    pub health_check_max_response_time: f64,
    #[serde(default = "default_consecutive_failures")]
    pub health_check_consecutive_failures: u32,
    #[serde(default = "default_reload_interval")]
    pub config_reload_interval: f64,
    #[serde(default = "default_true")]
    pub enable_active_health_check: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_auto_recovery_threshold")]
    pub auto_recovery_threshold: f64,
}

impl Default for RouterTuning {
    fn default() -> Self {
        Self {
            health_check_interval: default_health_check_interval(),
            health_check_timeout: default_health_check_timeout(),
            health_check_min_success_rate: default_min_success_rate(),
            health_check_max_response_time: default_max_response_time(),
            health_check_consecutive_failures: default_consecutive_failures(),
            config_reload_interval: default_reload_interval(),
            enable_active_health_check: true,
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            failure_threshold: default_failure_threshold(),
            auto_recovery_threshold: default_auto_recovery_threshold(),
        }
    }
}

impl RouterTuning {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_interval)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_timeout)
    }

    pub fn config_reload_interval(&self) -> Duration {
        Duration::from_secs_f64(self.config_reload_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }

    pub fn auto_recovery_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.auto_recovery_threshold)
    }
}

fn default_health_check_interval() -> f64 {
    10.0
}
fn default_health_check_timeout() -> f64 {
    5.0
}
fn default_min_success_rate() -> f64 {
    0.8
}
fn default_max_response_time() -> f64 {
    3.0
}
fn default_consecutive_failures() -> u32 {
    3
}
fn default_reload_interval() -> f64 {
    30.0
}
fn default_request_timeout() -> f64 {
    120.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> f64 {
    0.1
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_auto_recovery_threshold() -> f64 {
    60.0
}
fn default_true() -> bool {
    true
}

/// Top-level config file shape: `[servers] servers = [...]` and `[config]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub servers: ServersTable,
    #[serde(default, rename = "config")]
    pub tuning: RouterTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServersTable {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Config {
    /// Parse a config file from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RouterError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_str(&raw)
    }

    /// Parse config from an in-memory TOML string.
    pub fn from_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| RouterError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.servers.servers.is_empty() {
            return Err(RouterError::Config(
                "at least one upstream server must be configured".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for server in &self.servers.servers {
            if server.url.trim().is_empty() {
                return Err(RouterError::Config("server url cannot be empty".to_string()));
            }
            if !server.url.starts_with("http://") && !server.url.starts_with("https://") {
                return Err(RouterError::Config(format!(
                    "server url must be absolute http(s) url: {}",
                    server.url
                )));
            }
            if server.max_concurrent_requests == 0 {
                return Err(RouterError::Config(format!(
                    "max_concurrent_requests must be > 0 for {}",
                    server.url
                )));
            }
            if !seen.insert(server.url.clone()) {
                return Err(RouterError::Config(format!(
                    "duplicate server url: {}",
                    server.url
                )));
            }
        }

        Ok(())
    }
}

/// Resolves the config file path from CLI flag, `CONFIG_PATH`, or the default.
pub fn resolve_config_path(cli_override: Option<&str>) -> PathBuf {
    if let Some(path) = cli_override {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        return PathBuf::from(path);
    }
    PathBuf::from("servers.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let raw = r#"
            [servers]
            servers = [
                { url = "http://localhost:8001", max_concurrent_requests = 16 },
                { url = "http://localhost:8002", max_concurrent_requests = 32 },
            ]
        "#;
        let config = Config::from_str(raw).expect("valid config");
        assert_eq!(config.servers.servers.len(), 2);
        assert_eq!(config.tuning.max_retries, 3);
        assert_eq!(config.tuning.health_check_interval, 10.0);
    }

    #[test]
    fn rejects_empty_fleet() {
        let raw = "[servers]\nservers = []\n";
        assert!(Config::from_str(raw).is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let raw = r#"
            [servers]
            servers = [{ url = "http://localhost:8001", max_concurrent_requests = 0 }]
        "#;
        assert!(Config::from_str(raw).is_err());
    }

    #[test]
    fn rejects_duplicate_urls() {
        let raw = r#"
            [servers]
            servers = [
                { url = "http://localhost:8001", max_concurrent_requests = 8 },
                { url = "http://localhost:8001", max_concurrent_requests = 8 },
            ]
        "#;
        assert!(Config::from_str(raw).is_err());
    }

    #[test]
    fn overrides_tuning_knobs() {
        let raw = r#"
            [servers]
            servers = [{ url = "http://localhost:8001", max_concurrent_requests = 8 }]

            [config]
            max_retries = 5
            enable_active_health_check = false
        "#;
        let config = Config::from_str(raw).expect("valid config");
        assert_eq!(config.tuning.max_retries, 5);
        assert!(!config.tuning.enable_active_health_check);
    }
}
