//! Configuration settings for the bastion daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::BastionError;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store: StoreConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the YAML credential store.
    pub path: PathBuf,
    /// Poll interval for store modification checks, in seconds.
    #[serde(default = "default_watch_interval")]
    pub watch_interval_seconds: u64,
}

/// Replay cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Age past which a consumed (callsign, code) pair is forgotten.
    ///
    /// Must cover the full validity window of the largest permitted ttl
    /// (300 s) plus one step of clock skew on either side.
    #[serde(default = "default_replay_max_age")]
    pub max_age_seconds: u64,
    /// Maximum number of cached pairs; the oldest entry is evicted first.
    #[serde(default = "default_replay_max_entries")]
    pub max_entries: usize,
    /// Background cleanup interval in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

/// Process supervisor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecConfig {
    /// Grace period between SIGTERM and SIGKILL on watchdog expiry.
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_watch_interval() -> u64 {
    10
}

fn default_replay_max_age() -> u64 {
    900
}

fn default_replay_max_entries() -> usize {
    1000
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_grace_period() -> u64 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/aprs-bastion/audit.log")
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_replay_max_age(),
            max_entries: default_replay_max_entries(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: default_grace_period(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BastionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BastionError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| BastionError::Config {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), BastionError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(BastionError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(BastionError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.replay.max_age_seconds == 0 {
            return Err(BastionError::Config {
                message: "replay.max_age_seconds must be greater than zero".to_string(),
            });
        }

        if self.replay.max_entries == 0 {
            return Err(BastionError::Config {
                message: "replay.max_entries must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
