//! Layered configuration
//!
//! TOML files under `config/` (or a single file) overlaid by `HOOKCRON_*`
//! environment variables. See [`ConfigLoader`] for the precedence rules.

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{LoggerSettings, SchedulerConfig, ServerConfig, Settings};
