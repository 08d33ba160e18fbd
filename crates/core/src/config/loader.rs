//! Config path resolution
//!
//! Handles resolving paths for configuration files based on the executable's
//! location, with an environment variable override.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable that overrides the core config path
pub const CONFIG_ENV_VAR: &str = "TASKPARALLEL_CONFIG";

/// Returns the directory containing the running executable.
pub fn base_dir() -> ConfigResult<PathBuf> {
    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;

    exe.parent()
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the base configs directory.
///
/// Path: `{exe dir}/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(base_dir()?.join("configs"))
}

/// Returns the core config path.
///
/// Uses `TASKPARALLEL_CONFIG` when set and non-empty, otherwise
/// `{exe dir}/configs/taskparallel.toml`.
pub fn core_config_path() -> ConfigResult<PathBuf> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(configs_dir()?.join("taskparallel.toml")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configs_dir_is_next_to_executable() {
        let base = base_dir().unwrap();
        assert_eq!(configs_dir().unwrap(), base.join("configs"));
    }

    #[test]
    fn test_core_config_path_format() {
        if std::env::var_os(CONFIG_ENV_VAR).is_none() {
            let path = core_config_path().unwrap();
            assert!(path.ends_with("configs/taskparallel.toml"));
        }
    }
}
