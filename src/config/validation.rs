//! Configuration validation logic
//!
//! Each section validates itself; [`Settings::validate`] returns the first
//! error encountered.

use crate::config::error::ConfigError;
use crate::config::settings::{
    FileSettings, LoggerSettings, SchedulerConfig, ServerConfig, Settings,
};

/// Accepted `logger.level` values
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted `logger.file.format` values
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ServerConfig {
    /// Validate the listener settings
    ///
    /// # Validation Rules
    /// - Host must not be blank
    /// - Port must be between 1 and 65535
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(
                "server.host",
                "Host is required. Use 0.0.0.0 to listen on every interface.",
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate the scheduler settings
    ///
    /// # Validation Rules
    /// - Jobs file path must not be blank
    /// - Default webhook timeout must be greater than 0 seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs_file.trim().is_empty() {
            return Err(ConfigError::validation(
                "scheduler.jobs_file",
                "Jobs file path is required.",
            ));
        }

        if self.default_timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "scheduler.default_timeout_seconds",
                "Default webhook timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl FileSettings {
    /// Validate file output; the path only matters when enabled
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// # Validation Rules
    /// - Log level must be one of: trace, debug, info, warn, error
    /// - Console or file output must be enabled
    /// - If file logging is enabled, path must not be empty
    /// - Log format must be one of: full, compact, json
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl Settings {
    /// Validate every section in turn
    ///
    /// Returns the first validation error encountered, naming the offending
    /// field as a dotted path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.scheduler.validate()?;
        self.logger.validate()?;
        Ok(())
    }
}
