//! Error types for addonctl-core
//!
//! These cover configuration and filesystem failures only. Loader findings
//! about addons (broken manifests, cycles, illegal transitions) are reported
//! as [`Diagnostic`](crate::types::Diagnostic) values instead.

use thiserror::Error;

/// Result type alias using addonctl-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// An explicitly requested config file does not exist
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A config file exists but is not a valid overlay
    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// A setting has a value outside its accepted set
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidSetting {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// Anything else wrong with the resolved configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_parse(path: impl Into<String>, source: serde_yaml_ng::Error) -> Self {
        Self::ConfigParse {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_setting(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            value: value.into(),
            expected,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
