//! Substrate configuration.
//!
//! Component configs aggregate into a [`CoreConfig`] with preset
//! constructors, environment overrides and TOML/JSON file loading. The
//! substrate has no CLI; embedding applications construct components from
//! these values.

use crate::observability::LogConfig;
use crate::pool::WorkerPoolConfig;
use crate::recovery::RecoveryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Sizing for a kernel-local dynamic cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Starting capacity in entries.
    pub initial_capacity: usize,
    /// Default entry TTL in seconds (`0` = infinite).
    pub default_ttl_seconds: u64,
    /// Maintenance interval in seconds.
    pub cleanup_interval_seconds: u64,
    /// Enable adaptive resizing.
    pub auto_resize: bool,
    /// Adaptive floor in entries.
    pub min_capacity: usize,
    /// Adaptive ceiling in entries.
    pub max_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            default_ttl_seconds: 0,
            cleanup_interval_seconds: 5,
            auto_resize: false,
            min_capacity: 16,
            max_capacity: 4096,
        }
    }
}

impl CacheSettings {
    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the adaptive bounds are
    /// inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_capacity > self.max_capacity {
            return Err(ConfigError::InvalidValue(
                "cache min_capacity must be <= max_capacity".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unified substrate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Logging configuration.
    pub logging: LogConfig,
    /// Default worker-pool sizing for kernels.
    pub pool: WorkerPoolConfig,
    /// Default cache sizing for kernels.
    pub cache: CacheSettings,
    /// Recovery-manager configuration.
    pub recovery: RecoveryConfig,
    /// Environment name.
    pub environment: String,
    /// Service name reported in diagnostics.
    pub service_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl CoreConfig {
    /// Development configuration: small bounds, verbose logging.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            pool: WorkerPoolConfig::default(),
            cache: CacheSettings::default(),
            recovery: RecoveryConfig::default(),
            environment: "development".to_string(),
            service_name: "multikernel".to_string(),
        }
    }

    /// Production configuration: structured logging, larger bounds.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            pool: WorkerPoolConfig {
                min_threads: 4,
                max_threads: 16,
                queue_capacity: 4096,
                stack_size: 2 * 1024 * 1024,
            },
            cache: CacheSettings {
                initial_capacity: 4096,
                auto_resize: true,
                max_capacity: 16384,
                ..Default::default()
            },
            recovery: RecoveryConfig {
                max_points: 20,
                ..Default::default()
            },
            environment: "production".to_string(),
            service_name: "multikernel".to_string(),
        }
    }

    /// Testing configuration: tiny deterministic bounds.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            logging: LogConfig {
                level: crate::observability::LogLevel::Trace,
                ..Default::default()
            },
            pool: WorkerPoolConfig {
                min_threads: 1,
                max_threads: 2,
                queue_capacity: 64,
                stack_size: 256 * 1024,
            },
            cache: CacheSettings {
                initial_capacity: 32,
                max_capacity: 64,
                ..Default::default()
            },
            recovery: RecoveryConfig {
                max_points: 3,
                ..Default::default()
            },
            environment: "testing".to_string(),
            service_name: "multikernel".to_string(),
        }
    }

    /// Apply `MULTIKERNEL_*` environment overrides to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = std::env::var("MULTIKERNEL_LOG_LEVEL") {
            if let Ok(level) = val.parse() {
                config.logging.level = level;
            }
        }
        if let Ok(val) = std::env::var("MULTIKERNEL_MAX_THREADS") {
            config.pool.max_threads = val.parse().unwrap_or(config.pool.max_threads);
        }
        if let Ok(val) = std::env::var("MULTIKERNEL_QUEUE_CAPACITY") {
            config.pool.queue_capacity = val.parse().unwrap_or(config.pool.queue_capacity);
        }
        if let Ok(val) = std::env::var("MULTIKERNEL_CACHE_CAPACITY") {
            config.cache.initial_capacity = val.parse().unwrap_or(config.cache.initial_capacity);
        }
        if let Ok(val) = std::env::var("MULTIKERNEL_RECOVERY_DIR") {
            config.recovery.point.storage_path = val.into();
        }
        if let Ok(val) = std::env::var("MULTIKERNEL_ENVIRONMENT") {
            config.environment = val;
        }
        config
    }

    /// Load from a TOML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on read or parse failure, or for an
    /// unsupported extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        match ext {
            "json" => serde_json::from_str(&contents).map_err(ConfigError::Json),
            "toml" => toml::from_str(&contents).map_err(ConfigError::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first section's [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        self.cache.validate()?;
        self.recovery
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading a config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Unsupported config file format.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration value.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
