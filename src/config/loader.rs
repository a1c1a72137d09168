//! Layered configuration loader
//!
//! Sources, lowest to highest priority:
//! 1. `default.toml`
//! 2. `{environment}.toml`
//! 3. `local.toml`
//! 4. `HOOKCRON_*` environment variables
//!
//! All files are optional. Setting `HOOKCRON_CONFIG_FILE` (or the CLI
//! `--config` flag) replaces the three files with a single required file.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "HOOKCRON_CONFIG_DIR";

const CONFIG_FILE_ENV: &str = "HOOKCRON_CONFIG_FILE";

const DEFAULT_CONFIG_DIR: &str = "config";

const ENV_PREFIX: &str = "HOOKCRON";

/// Separator for nested keys, `HOOKCRON_SERVER__PORT` -> `server.port`
const ENV_SEPARATOR: &str = "__";

#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    /// When set, layered loading is skipped
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a loader from `HOOKCRON_CONFIG_DIR`, `HOOKCRON_CONFIG_FILE`
    /// and `HOOKCRON_APP_ENV`.
    ///
    /// # Errors
    ///
    /// Fails when both `HOOKCRON_CONFIG_DIR` and `HOOKCRON_CONFIG_FILE` are set.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from);
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_dir.is_some() && config_file.is_some() {
            return Err(ConfigError::mutual_exclusivity(
                "HOOKCRON_CONFIG_DIR and HOOKCRON_CONFIG_FILE cannot both be set. \
                 Use HOOKCRON_CONFIG_DIR for layered configuration or \
                 HOOKCRON_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir: config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            config_file,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Load a single file instead of the layered directory
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Load, deserialize and validate the settings
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let settings: Settings = self.build_config()?.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {e}"))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = match self.config_file {
            Some(ref file) => Self::add_file_source(Config::builder(), file, true)?,
            None => self.build_layered_config(Config::builder())?,
        };

        Self::add_env_source(builder)
            .build()
            .map_err(ConfigError::from)
    }

    fn build_layered_config(
        &self,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let layers = [
            "default.toml".to_string(),
            format!("{}.toml", self.environment.as_str()),
            "local.toml".to_string(),
        ];

        layers.iter().try_fold(builder, |builder, name| {
            Self::add_file_source(builder, &self.config_dir.join(name), false)
        })
    }

    fn add_file_source(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
        required: bool,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        if required && !path.is_file() {
            return Err(ConfigError::file_not_found(format!(
                "Required configuration file not found: {}",
                path.display()
            )));
        }

        let Some(name) = path.to_str() else {
            return Err(ConfigError::ParseError(format!(
                "Configuration path is not valid UTF-8: {}",
                path.display()
            )));
        };

        Ok(builder.add_source(File::new(name, FileFormat::Toml).required(required)))
    }

    fn add_env_source(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Tests mutate process-wide environment variables
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const MANAGED_VARS: &[&str] = &[
        CONFIG_DIR_ENV,
        CONFIG_FILE_ENV,
        AppEnvironment::ENV_VAR,
        "HOOKCRON_SERVER__PORT",
        "HOOKCRON_SCHEDULER__JOBS_FILE",
    ];

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).expect("Failed to write config file");
        }
        temp_dir
    }

    /// Restores every touched variable on drop
    struct EnvGuard {
        vars_to_restore: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Start from a clean slate for every managed variable
        fn clean() -> Self {
            let mut guard = Self {
                vars_to_restore: Vec::new(),
            };
            for key in MANAGED_VARS {
                guard.remove(key);
            }
            guard
        }

        fn remember(&mut self, key: &str) {
            if !self.vars_to_restore.iter().any(|(k, _)| k == key) {
                self.vars_to_restore.push((key.to_string(), std::env::var(key).ok()));
            }
        }

        fn set(&mut self, key: &str, value: &str) {
            self.remember(key);
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&mut self, key: &str) {
            self.remember(key);
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, original) in &self.vars_to_restore {
                unsafe {
                    match original {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_new_defaults() {
        let _guard = lock();
        let _env = EnvGuard::clean();

        let loader = ConfigLoader::new().unwrap();
        assert_eq!(loader.config_dir(), Path::new("config"));
        assert!(loader.config_file().is_none());
        assert_eq!(loader.environment(), AppEnvironment::Development);
    }

    #[test]
    fn test_mutual_exclusivity() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        env.set(CONFIG_DIR_ENV, "/custom/config");
        env.set(CONFIG_FILE_ENV, "/path/to/config.toml");

        match ConfigLoader::new() {
            Err(ConfigError::MutualExclusivityError(msg)) => {
                assert!(msg.contains("HOOKCRON_CONFIG_DIR"));
                assert!(msg.contains("HOOKCRON_CONFIG_FILE"));
            }
            other => panic!("Expected MutualExclusivityError, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_from_env() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        env.set(AppEnvironment::ENV_VAR, "prod");

        let loader = ConfigLoader::new().unwrap();
        assert_eq!(loader.environment(), AppEnvironment::Production);
    }

    #[test]
    fn test_empty_directory_yields_defaults() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        let dir = setup_config_dir(&[]);
        env.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());

        let settings = ConfigLoader::new().unwrap().load().unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_layer_precedence() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        let dir = setup_config_dir(&[
            (
                "default.toml",
                "[server]\nhost = \"127.0.0.1\"\nport = 3000\n\n[scheduler]\njobs_file = \"default.yaml\"\ndefault_timeout_seconds = 10\n",
            ),
            ("test.toml", "[server]\nport = 4000\n\n[scheduler]\njobs_file = \"test.yaml\"\n"),
            ("local.toml", "[scheduler]\njobs_file = \"local.yaml\"\n"),
            ("production.toml", "[server]\nport = 9999\n"),
        ]);
        env.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());
        env.set(AppEnvironment::ENV_VAR, "test");
        env.set("HOOKCRON_SERVER__PORT", "5000");

        let settings = ConfigLoader::new().unwrap().load().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.scheduler.jobs_file, "local.yaml");
        assert_eq!(settings.scheduler.default_timeout_seconds, 10);
    }

    #[test]
    fn test_single_file_mode_skips_directory() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        let dir = setup_config_dir(&[
            ("default.toml", "[server]\nport = 3000\n"),
            ("custom.toml", "[server]\nport = 7000\n"),
        ]);
        env.set(CONFIG_FILE_ENV, dir.path().join("custom.toml").to_str().unwrap());

        let settings = ConfigLoader::new().unwrap().load().unwrap();
        assert_eq!(settings.server.port, 7000);
    }

    #[test]
    fn test_with_config_file_overrides_directory() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        let dir = setup_config_dir(&[
            ("default.toml", "[server]\nport = 3000\n"),
            ("cli.toml", "[scheduler]\njobs_file = \"cli.yaml\"\n"),
        ]);
        env.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());

        let settings = ConfigLoader::new()
            .unwrap()
            .with_config_file(dir.path().join("cli.toml"))
            .load()
            .unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.scheduler.jobs_file, "cli.yaml");
    }

    #[test]
    fn test_missing_single_file() {
        let _guard = lock();
        let _env = EnvGuard::clean();

        let result = ConfigLoader::new()
            .unwrap()
            .with_config_file("/nonexistent/hookcron.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(msg)) if msg.contains("hookcron.toml")));
    }

    #[test]
    fn test_with_environment_selects_layer() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        let dir = setup_config_dir(&[("staging.toml", "[server]\nport = 6000\n")]);
        env.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());

        let settings = ConfigLoader::new()
            .unwrap()
            .with_environment(AppEnvironment::Staging)
            .load()
            .unwrap();
        assert_eq!(settings.server.port, 6000);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let _guard = lock();
        let mut env = EnvGuard::clean();
        let dir = setup_config_dir(&[("default.toml", "[scheduler]\ndefault_timeout_seconds = 0\n")]);
        env.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());

        let result = ConfigLoader::new().unwrap().load();
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }
}
