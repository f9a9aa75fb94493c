//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! cloak-room chat matchmaking service, including environment variable
//! loading, TOML file loading, and validation.

use crate::config::policy::PolicySettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub policy: PolicySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Which queue store backs the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    /// Plain in-memory FIFO buckets
    Memory,
    /// In-memory buckets with a per-entry TTL safety net
    Expiring,
}

/// HTTP/WebSocket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to
    pub host: String,
    /// Port for the chat channel and health endpoints
    pub port: u16,
    /// Queue store implementation selected at startup
    pub queue_backend: QueueBackendKind,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "cloak-room".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            queue_backend: QueueBackendKind::Memory,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Server settings
        if let Ok(host) = env::var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid SERVER_PORT value: {}", port))?;
        }
        if let Ok(backend) = env::var("QUEUE_BACKEND") {
            config.server.queue_backend = match backend.to_lowercase().as_str() {
                "memory" => QueueBackendKind::Memory,
                "expiring" => QueueBackendKind::Expiring,
                _ => return Err(anyhow!("Invalid QUEUE_BACKEND value: {}", backend)),
            };
        }

        // Policy settings
        if let Ok(cooldown) = env::var("QUEUE_COOLDOWN_SECONDS") {
            config.policy.queue_cooldown_seconds = cooldown
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_COOLDOWN_SECONDS value: {}", cooldown))?;
        }
        if let Ok(limit) = env::var("DAILY_SPECIFIC_FILTER_LIMIT") {
            config.policy.daily_specific_filter_limit = limit
                .parse()
                .map_err(|_| anyhow!("Invalid DAILY_SPECIFIC_FILTER_LIMIT value: {}", limit))?;
        }
        if let Ok(max_len) = env::var("MAX_MESSAGE_LENGTH") {
            config.policy.max_message_length = max_len
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_MESSAGE_LENGTH value: {}", max_len))?;
        }
        if let Ok(expiry) = env::var("QUEUE_ENTRY_EXPIRY_SECONDS") {
            config.policy.queue_entry_expiry_seconds = expiry
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_ENTRY_EXPIRY_SECONDS value: {}", expiry))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports and timeouts
    if config.server.port == 0 {
        return Err(anyhow!("Server port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate policy settings
    if config.policy.max_message_length == 0 {
        return Err(anyhow!("Max message length must be greater than 0"));
    }
    if !(300..=3600).contains(&config.policy.queue_entry_expiry_seconds) {
        return Err(anyhow!(
            "Queue entry expiry must be between 300 and 3600 seconds, got {}",
            config.policy.queue_entry_expiry_seconds
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.name, "cloak-room");
        assert_eq!(config.server.queue_backend, QueueBackendKind::Memory);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_queue_entry_expiry_bounds() {
        let mut config = AppConfig::default();
        config.policy.queue_entry_expiry_seconds = 299;
        assert!(validate_config(&config).is_err());

        config.policy.queue_entry_expiry_seconds = 3600;
        assert!(validate_config(&config).is_ok());

        config.policy.queue_entry_expiry_seconds = 3601;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = r#"
            [service]
            log_level = "debug"

            [server]
            port = 9090
            queue_backend = "expiring"

            [policy]
            queue_cooldown_seconds = 5
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.queue_backend, QueueBackendKind::Expiring);
        assert_eq!(config.policy.queue_cooldown_seconds, 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.policy.daily_specific_filter_limit, 5);
    }
}
