//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to load, validate or save a [`HalConfig`](crate::HalConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("cannot write config {path}: {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML.
    #[error("config syntax: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The configuration has no TOML representation.
    #[error("config serialization: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A format override names an unsupported encoding.
    #[error("invalid format '{value}' for {slot}")]
    InvalidFormat {
        /// Configuration key the value came from.
        slot: String,
        /// The rejected value.
        value: String,
    },

    /// A card override is not a PCM node name.
    #[error("invalid card '{value}' for {slot}: expected pcmC<card>D<device><p|c>")]
    InvalidCard {
        /// Configuration key the value came from.
        slot: String,
        /// The rejected value.
        value: String,
    },

    /// The directory holding the configuration could not be created.
    #[error("cannot create {path}: {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// [`ConfigError::ReadFile`] for `path`.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::WriteFile`] for `path`.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::CreateDir`] for `path`.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn not_found() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no such file")
    }

    #[test]
    fn read_error_names_the_file() {
        let err = ConfigError::read_file("/etc/pcmhal/hal.toml", not_found());
        assert_eq!(
            err.to_string(),
            "cannot read config /etc/pcmhal/hal.toml: no such file"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn create_dir_keeps_path() {
        let err = ConfigError::create_dir("/var/lib/pcmhal", not_found());
        assert!(
            matches!(err, ConfigError::CreateDir { ref path, .. } if path.ends_with("pcmhal"))
        );
    }

    #[test]
    fn invalid_format_display() {
        let err = ConfigError::InvalidFormat {
            slot: "output.speaker".to_string(),
            value: "f32".to_string(),
        };
        assert_eq!(err.to_string(), "invalid format 'f32' for output.speaker");
        assert!(err.source().is_none());
    }

    #[test]
    fn invalid_card_display() {
        let err = ConfigError::InvalidCard {
            slot: "input".to_string(),
            value: "hw:0".to_string(),
        };
        assert!(err.to_string().contains("pcmC<card>D<device>"));
    }
}
