//! Configuration management for the portal services.
//!
//! All portal services share a unified configuration file at
//! `~/.stock-portal/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (PORTAL_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PORTAL_SCREENER_PORT` → screener.port
//! - `PORTAL_BIND_ADDRESS` → network.bind
//! - `PORTAL_LOG_LEVEL` → observability.log_level
//! - `PORTAL_TWSE_BASE_URL` → market_data.base_url

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".stock-portal"),
        |dirs| dirs.home_dir().join(".stock-portal"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Global network configuration.
///
/// Controls the bind address for all services. Default is `127.0.0.1`
/// (local only). Set to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for all services.
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

// ============================================================================
// Screener Service Configuration
// ============================================================================

/// Screener service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// HTTP port for the screener service.
    #[serde(default = "default_screener_port")]
    pub port: u16,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            port: default_screener_port(),
        }
    }
}

fn default_screener_port() -> u16 {
    4520
}

// ============================================================================
// Market Data Configuration
// ============================================================================

/// Market-data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Base URL of the exchange open-data API.
    #[serde(default = "default_twse_base_url")]
    pub base_url: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_twse_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_twse_base_url() -> String {
    "https://openapi.twse.com.tw/v1".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Unified configuration for portal services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Screener service configuration
    #[serde(default)]
    pub screener: ScreenerConfig,

    /// Market-data source configuration
    #[serde(default)]
    pub market_data: MarketDataConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORTAL_SCREENER_PORT") {
            if let Ok(p) = port.parse() {
                self.screener.port = p;
            }
        }

        if let Ok(bind) = std::env::var("PORTAL_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Ok(level) = std::env::var("PORTAL_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(url) = std::env::var("PORTAL_TWSE_BASE_URL") {
            self.market_data.base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind, "127.0.0.1");
        assert_eq!(config.screener.port, 4520);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.market_data.base_url.contains("twse"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"screener": {{"port": 9999}}, "observability": {{"level": "debug"}}}}"#
        )
        .unwrap();

        let config = Config::load_from(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.screener.port, 9999);
        // "level" alias maps to log_level
        assert_eq!(config.observability.log_level, "debug");
        // Missing sections fall back to defaults
        assert_eq!(config.network.bind, "127.0.0.1");
    }

    #[test]
    fn test_load_from_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(Config::load_from(&file.path().to_path_buf()).is_err());
    }
}
