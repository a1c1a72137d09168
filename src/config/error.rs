//! Configuration error types

use thiserror::Error;

/// Everything that can go wrong while loading or checking settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested settings file does not exist
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// A settings source could not be read or deserialized
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A loaded value is out of range or malformed
    #[error("Validation error: {field} - {message}")]
    ValidationError {
        /// Dotted path of the offending setting, e.g. `server.port`
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// `HOOKCRON_APP_ENV` (or `--env`) names an unknown environment
    #[error("Environment variable error: {0}")]
    EnvVarError(String),

    /// `HOOKCRON_CONFIG_DIR` and `HOOKCRON_CONFIG_FILE` were both set
    #[error("Mutual exclusivity error: {0}")]
    MutualExclusivityError(String),

    /// Raised by the `config` crate while merging sources
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

impl ConfigError {
    /// Validation failure for the setting at `field`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Missing settings file at `path`
    pub fn file_not_found(path: impl Into<String>) -> Self {
        ConfigError::FileNotFound(path.into())
    }

    /// Two settings sources that cannot be combined
    pub fn mutual_exclusivity(message: impl Into<String>) -> Self {
        ConfigError::MutualExclusivityError(message.into())
    }
}
