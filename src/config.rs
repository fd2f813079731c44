//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, WheelTrackerError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sampling loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_start_running")]
    pub start_running: bool,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Device registry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_hotplug_interval_ms")]
    pub hotplug_interval_ms: u64,

    #[serde(default)]
    pub auto_connect: bool,
}

/// Script bridge configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_enabled")]
    pub enabled: bool,

    #[serde(default = "default_bridge_url")]
    pub url: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty means stderr only.
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_interval_ms() -> u64 { 50 }
fn default_start_running() -> bool { true }
fn default_channel_capacity() -> usize { 64 }

fn default_hotplug_interval_ms() -> u64 { 1000 }

fn default_bridge_enabled() -> bool { true }
fn default_bridge_url() -> String { "http://127.0.0.1:8086".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            start_running: default_start_running(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hotplug_interval_ms: default_hotplug_interval_ms(),
            auto_connect: false,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_bridge_enabled(),
            url: default_bridge_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl TrackingConfig {
    /// Tick period of the sampling loop.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl RegistryConfig {
    /// Period of the hotplug rescan.
    pub fn hotplug_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wheel_tracker::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.tracking.interval_ms == 0 || self.tracking.interval_ms > 1000 {
            return Err(invalid("interval_ms must be between 1 and 1000"));
        }

        if self.tracking.channel_capacity == 0 {
            return Err(invalid("channel_capacity must be greater than 0"));
        }

        if self.registry.hotplug_interval_ms == 0 || self.registry.hotplug_interval_ms > 60000 {
            return Err(invalid("hotplug_interval_ms must be between 1 and 60000"));
        }

        if self.bridge.enabled && self.bridge.url.is_empty() {
            return Err(invalid("bridge url cannot be empty when enabled"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level '{}' must be one of: trace, debug, info, warn, error",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> WheelTrackerError {
    WheelTrackerError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tracking.interval(), Duration::from_millis(50));
        assert_eq!(config.bridge.url, "http://127.0.0.1:8086");
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[tracking]
interval_ms = 20

[registry]
auto_connect = true

[bridge]

[logging]
level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.tracking.interval_ms, 20);
        assert!(config.tracking.start_running);
        assert!(config.registry.auto_connect);
        assert_eq!(config.registry.hotplug_interval_ms, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.tracking.interval_ms, 50);
        assert_eq!(config.tracking.channel_capacity, 64);
        assert!(config.bridge.enabled);
        assert!(config.logging.log_dir.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/wheel-tracker.toml");
        assert!(matches!(result, Err(WheelTrackerError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::parse("[tracking\ninterval_ms = ");
        assert!(matches!(result, Err(WheelTrackerError::Config(_))));
    }

    #[test]
    fn test_interval_zero() {
        let mut config = Config::default();
        config.tracking.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_high() {
        let mut config = Config::default();
        config.tracking.interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_capacity_zero() {
        let mut config = Config::default();
        config.tracking.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hotplug_interval_bounds() {
        let mut config = Config::default();
        config.registry.hotplug_interval_ms = 0;
        assert!(config.validate().is_err());

        config.registry.hotplug_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_bridge_url_when_enabled() {
        let mut config = Config::default();
        config.bridge.url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_bridge_url_when_disabled() {
        let mut config = Config::default();
        config.bridge.enabled = false;
        config.bridge.url = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_interval_ms(), 50);
        assert_eq!(default_start_running(), true);
        assert_eq!(default_channel_capacity(), 64);
        assert_eq!(default_hotplug_interval_ms(), 1000);
        assert_eq!(default_bridge_enabled(), true);
        assert_eq!(default_bridge_url(), "http://127.0.0.1:8086");
        assert_eq!(default_log_level(), "info");
    }
}
