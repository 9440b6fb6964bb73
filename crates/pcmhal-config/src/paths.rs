//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/pcmhal/hal.toml`
//! - macOS: `~/Library/Application Support/pcmhal/hal.toml`
//! - Windows: `%APPDATA%\pcmhal\hal.toml`

use std::path::PathBuf;

use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "pcmhal";

/// File name of the configuration file.
const CONFIG_FILE: &str = "hal.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Ensure the user configuration directory exists.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_ends_with_app_file() {
        let path = default_config_path();
        assert!(path.ends_with("pcmhal/hal.toml"));
    }
}
