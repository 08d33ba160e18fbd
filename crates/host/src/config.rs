//! Host configuration
//!
//! Wraps the core runtime config with the consumer loop and logging
//! settings. Stored as `configs/host.toml` next to the executable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use taskparallel_core::config::{configs_dir, ConfigResult};
use taskparallel_core::{ConfigError, CoreConfig};

/// Consumer loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target time between frames in milliseconds
    pub interval_ms: u64,

    /// Frames slower than this are logged as warnings
    pub slow_frame_warn_ms: u64,

    /// Stop `run_until` after this many frames (unlimited when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            interval_ms: 16,
            slow_frame_warn_ms: 5,
            max_frames: None,
        }
    }
}

/// Full host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Default `tracing` filter; `RUST_LOG` takes precedence
    pub log_filter: String,

    /// Core runtime settings
    pub core: CoreConfig,

    /// Consumer loop settings
    pub frame: FrameConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            core: CoreConfig::default(),
            frame: FrameConfig::default(),
        }
    }
}

impl HostConfig {
    /// Default location: `{exe dir}/configs/host.toml`
    pub fn default_path() -> ConfigResult<PathBuf> {
        Ok(configs_dir()?.join("host.toml"))
    }

    /// Parse and validate a host config from TOML text
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
            tracing::debug!("Loaded host config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, toml::to_string_pretty(&default)?)?;
            tracing::info!("Created default host config at {:?}", path);
            Ok(default)
        }
    }

    /// Filter passed to the subscriber: `core.debug` raises it to `debug`
    pub fn effective_log_filter(&self) -> &str {
        if self.core.debug {
            "debug"
        } else {
            &self.log_filter
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.core.validate()?;
        if self.frame.max_frames == Some(0) {
            return Err(ConfigError::Invalid(
                "frame.max_frames must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_default() {
        let config = HostConfig::default();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.frame.interval_ms, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_core_tables() {
        let config = HostConfig::from_toml_str(
            r#"
            log_filter = "taskparallel_core=debug"

            [core.tasks]
            thread_name_prefix = "bg"

            [core.dispatcher]
            capacity = 128

            [frame]
            interval_ms = 8
            max_frames = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.log_filter, "taskparallel_core=debug");
        assert_eq!(config.core.tasks.thread_name_prefix, "bg");
        assert_eq!(config.core.dispatcher.capacity, Some(128));
        assert_eq!(config.frame.interval_ms, 8);
        assert_eq!(config.frame.slow_frame_warn_ms, 5);
        assert_eq!(config.frame.max_frames, Some(600));
    }

    #[test]
    fn test_core_debug_raises_log_filter() {
        let config = HostConfig::from_toml_str("log_filter = \"warn\"\n").unwrap();
        assert_eq!(config.effective_log_filter(), "warn");

        let config =
            HostConfig::from_toml_str("log_filter = \"warn\"\n\n[core]\ndebug = true\n").unwrap();
        assert_eq!(config.effective_log_filter(), "debug");
    }

    #[test]
    fn test_invalid_core_section_rejected() {
        let err = HostConfig::from_toml_str("[core.dispatcher]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut config = HostConfig::default();
        config.frame.max_frames = Some(10);

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert_eq!(HostConfig::from_toml_str(&toml_str).unwrap(), config);
    }
}
