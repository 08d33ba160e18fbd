//! Configuration system for taskparallel
//!
//! This module provides the serde-backed runtime configuration:
//! - Task thread naming and stack size
//! - Dispatcher queue capacity and per-drain budget
//! - TOML file format with auto-generation of default configs
//! - Manual reload capability
//!
//! # Example
//!
//! ```ignore
//! use taskparallel_core::config::{core_config_path, CoreConfig};
//!
//! let config = CoreConfig::load(&core_config_path()?)?;
//! let dispatcher = taskparallel_core::initialize_dispatcher_with(&config.dispatcher);
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{base_dir, configs_dir, core_config_path, CONFIG_ENV_VAR};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A value parsed but is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Could not determine config directory from the executable location
    #[error("Config directory not available - could not resolve executable base path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the threads that back tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Prefix for task thread names; threads are named `{prefix}-{task id}`
    pub thread_name_prefix: String,

    /// Stack size for task threads in bytes (platform default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_size: Option<usize>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "taskparallel".to_string(),
            stack_size: None,
        }
    }
}

/// Settings for the consumer-thread callback queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of queued callbacks (unbounded when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Maximum callbacks executed by a single drain; the rest wait for the
    /// next drain (whole backlog when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_callbacks_per_drain: Option<usize>,
}

/// Core runtime configuration.
///
/// Loaded from `configs/taskparallel.toml` next to the executable, or from the
/// path in the `TASKPARALLEL_CONFIG` environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging; hosts raise their log filter to `debug`
    pub debug: bool,

    /// Task thread settings
    pub tasks: TaskConfig,

    /// Dispatcher queue settings
    pub dispatcher: DispatcherConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            tasks: TaskConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a config from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file, creating default if missing.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            tracing::debug!("Loaded core config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save(path)?;
            tracing::info!("Created default core config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload config from file.
    ///
    /// On error `self` is left untouched.
    pub fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = Self::from_toml_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tasks.thread_name_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "tasks.thread_name_prefix must not be empty".to_string(),
            ));
        }
        if self.tasks.stack_size == Some(0) {
            return Err(ConfigError::Invalid(
                "tasks.stack_size must be > 0".to_string(),
            ));
        }
        if self.dispatcher.capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "dispatcher.capacity must be > 0".to_string(),
            ));
        }
        if self.dispatcher.max_callbacks_per_drain == Some(0) {
            return Err(ConfigError::Invalid(
                "dispatcher.max_callbacks_per_drain must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.tasks.thread_name_prefix, "taskparallel");
        assert_eq!(config.dispatcher.capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_core_config_serialize() {
        let mut config = CoreConfig::default();
        config.version = 2;
        config.debug = true;
        config.dispatcher.capacity = Some(256);

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("version = 2"));
        assert!(toml_str.contains("debug = true"));
        assert!(toml_str.contains("capacity = 256"));
        assert!(!toml_str.contains("stack_size"));

        let parsed = CoreConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = CoreConfig::from_toml_str(
            r#"
            [dispatcher]
            max_callbacks_per_drain = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.tasks, TaskConfig::default());
        assert_eq!(config.dispatcher.max_callbacks_per_drain, Some(64));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = CoreConfig::from_toml_str("[dispatcher]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CoreConfig::from_toml_str("[tasks]\nthread_name_prefix = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = CoreConfig::from_toml_str("version = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_creates_default_then_reloads() {
        let dir = std::env::temp_dir().join(format!(
            "taskparallel-config-test-{}",
            std::process::id()
        ));
        let path = dir.join("configs").join("taskparallel.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let created = CoreConfig::load(&path).unwrap();
        assert_eq!(created, CoreConfig::default());
        assert!(path.exists());

        std::fs::write(&path, "debug = true\n").unwrap();
        let mut config = created;
        config.reload(&path).unwrap();
        assert!(config.debug);

        std::fs::write(&path, "[tasks]\nstack_size = 0\n").unwrap();
        assert!(config.reload(&path).is_err());
        assert!(config.debug);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
