//! Configuration management for Mango
//!
//! Three TOML files live in the config directory:
//! - `config.toml`: runtime configuration ([`AppConfig`])
//! - `settings.toml`: user proxy settings ([`ProxySettings`])
//! - `state.toml`: the persisted subscription selection ([`SelectionState`])

mod app;
mod selection;
pub mod serde_utils;
mod settings;

pub use app::{AppConfig, CoreConfig, FetchConfig, TunnelConfig};
pub use selection::SelectionState;
pub use settings::{LogSeverity, LoggingPolicy, NetworkPolicy, ProxySettings, SniffingPolicy};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mango")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default proxy settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.toml")
}

/// Get the default selection state file path
pub fn default_state_path() -> PathBuf {
    default_config_dir().join("state.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a file, falling back to defaults when it is missing
pub fn load_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match load_config(path) {
        Err(ConfigError::NotFound(_)) => {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(T::default())
        }
        other => other,
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result: Result<AppConfig, _> = load_config(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let settings: ProxySettings = load_or_default(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, ProxySettings::default());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.log_channel_capacity = 42;
        save_config(&path, &config).unwrap();

        let loaded: AppConfig = load_config(&path).unwrap();
        assert_eq!(loaded.log_channel_capacity, 42);
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "sniffing = [").unwrap();

        let result: Result<ProxySettings, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
