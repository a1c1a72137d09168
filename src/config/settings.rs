//! Configuration settings structures
//!
//! Everything here can be loaded from TOML files and `HOOKCRON_*`
//! environment variables. Every field has a default so a missing file
//! still yields a runnable configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::jobs::SchedulerOptions;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_jobs_file() -> String {
    "jobs.yaml".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/hookcron.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Management API listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` for binding the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// Scheduler Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// YAML document holding the job definitions
    #[serde(default = "default_jobs_file")]
    pub jobs_file: String,

    /// Timeout for webhooks that leave `timeout` at 0
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Upper bound on simultaneous job runs, 0 for no bound
    #[serde(default)]
    pub max_concurrent_executions: usize,
}

impl SchedulerConfig {
    pub fn jobs_path(&self) -> PathBuf {
        PathBuf::from(&self.jobs_file)
    }

    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            default_timeout: Duration::from_secs(self.default_timeout_seconds),
            max_concurrent_executions: self.max_concurrent_executions,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jobs_file: default_jobs_file(),
            default_timeout_seconds: default_timeout_seconds(),
            max_concurrent_executions: 0,
        }
    }
}

// ============================================================================
// Logger Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    /// Truncate on startup when false
    #[serde(default = "default_true")]
    pub append: bool,

    /// "full", "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: true,
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// "trace", "debug", "info", "warn" or "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Turn the file representation into the runtime [`LoggerConfig`]
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format)
            .map_err(|e| ConfigError::validation("logger.file", e.to_string()))
    }
}

// ============================================================================
// Root
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.address(), "0.0.0.0:8080");
        assert_eq!(settings.scheduler.jobs_path(), PathBuf::from("jobs.yaml"));
        assert_eq!(settings.scheduler.default_timeout_seconds, 30);
        assert_eq!(settings.scheduler.max_concurrent_executions, 0);
        assert_eq!(settings.logger.level, "info");
        assert!(settings.logger.console.enabled);
        assert!(!settings.logger.file.enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
[server]
port = 9000

[logger.file]
enabled = true
format = "compact"
"#;
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.scheduler, SchedulerConfig::default());
        assert!(settings.logger.file.enabled);
        assert!(settings.logger.file.append);
        assert_eq!(settings.logger.file.path, "logs/hookcron.log");
    }

    #[test]
    fn test_scheduler_options() {
        let config = SchedulerConfig {
            jobs_file: "data/jobs.yaml".to_string(),
            default_timeout_seconds: 5,
            max_concurrent_executions: 3,
        };
        let options = config.options();
        assert_eq!(options.default_timeout, Duration::from_secs(5));
        assert_eq!(options.max_concurrent_executions, 3);
    }

    #[test]
    fn test_into_logger_config() {
        let mut settings = LoggerSettings::default();
        settings.level = "debug".to_string();
        settings.file.enabled = true;
        settings.file.format = "Full".to_string();

        let config = settings.into_logger_config().unwrap();
        assert_eq!(config.level, "debug");
        assert!(config.file.enabled);
        assert!(matches!(config.file.format, LogFormat::Full));
        assert_eq!(config.file.path, PathBuf::from("logs/hookcron.log"));
    }

    #[test]
    fn test_into_logger_config_rejects_bad_format() {
        let mut settings = LoggerSettings::default();
        settings.file.format = "xml".to_string();
        let err = settings.into_logger_config().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "logger.file.format"));
    }

    fn arb_settings() -> impl Strategy<Value = Settings> {
        (
            1u16..=65535u16,
            "[a-z][a-z0-9_/]{0,20}\\.yaml",
            1u64..=600u64,
            0usize..=64usize,
            prop_oneof![Just("trace"), Just("debug"), Just("info"), Just("warn"), Just("error")],
            prop_oneof![Just("full"), Just("compact"), Just("json")],
        )
            .prop_map(|(port, jobs_file, timeout, max, level, format)| Settings {
                server: ServerConfig {
                    host: "127.0.0.1".to_string(),
                    port,
                },
                scheduler: SchedulerConfig {
                    jobs_file,
                    default_timeout_seconds: timeout,
                    max_concurrent_executions: max,
                },
                logger: LoggerSettings {
                    level: level.to_string(),
                    file: FileSettings {
                        format: format.to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            })
    }

    proptest! {
        #[test]
        fn prop_in_range_settings_validate(settings in arb_settings()) {
            prop_assert!(settings.validate().is_ok());
            prop_assert!(settings.logger.clone().into_logger_config().is_ok());
        }
    }
}
