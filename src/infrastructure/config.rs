//! Configuration file management.
//!
//! Handles loading TOML configuration files and writing the default one.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
pub const DEFAULT_CONFIG: &str = r#"# wa-direct-export configuration
# Every value below is the built-in default.

[export]
# Archive root (relative paths resolve against the working directory)
output_dir = "output"

# Extraction budget in seconds; the run is cut hard when it runs out
extract_secs = 300

# Messages requested per page
page_size = 500

[sync]
# Maximum time spent waiting for the chat list to settle, in seconds
max_secs = 300
poll_interval_ms = 1000

# Unchanged polls in a row that count as settled
stable_polls = 3
log_interval_secs = 10

[bridge]
base_url = "http://127.0.0.1:3000"

[ui]
progress = true
"#;

/// Load configuration from `path`, or from the default location.
///
/// A missing file is not an error and yields the defaults.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else if path.is_some() {
        Err(AppError::Config {
            message: format!("Config file not found: {}", config_path.display()),
        })
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    let config = toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })?;

    tracing::debug!(path = %path.display(), "Loaded configuration");

    Ok(config)
}

/// Write the default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %path.display(), "Created default configuration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.export.extract_secs, 300);
        assert_eq!(config.export.page_size, 500);
        assert_eq!(config.sync.stable_polls, 3);
    }

    #[test]
    fn test_ensure_then_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        ensure_config_exists(&config_path).unwrap();
        let loaded = load_config(Some(&config_path)).unwrap();

        assert_eq!(loaded.sync.max_secs, 300);
        assert_eq!(loaded.bridge.base_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[export\npage_size = ").unwrap();
        assert!(matches!(
            load_config_from_file(&path),
            Err(AppError::Config { .. })
        ));
    }
}
