//! Merges CLI overrides on top of file and environment configuration.
//!
//! Precedence, lowest to highest: config files, `HOOKCRON_*` variables,
//! global flags (`--verbose`, `--quiet`), serve flags.

use super::parser::{Cli, ServeArgs};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, Settings};

pub struct ConfigurationMerger {
    base_config: Settings,
    environment: Environment,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings, environment: Environment) -> Self {
        Self {
            base_config,
            environment,
        }
    }

    /// Load the base settings honoring `--config` and `--env`
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new()?;
        if let Some(ref path) = cli.config {
            loader = loader.with_config_file(path);
        }
        if let Some(env) = cli.env {
            loader = loader.with_environment(env.into());
        }

        let environment = loader.environment();
        Ok(Self::new(loader.load()?, environment))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Apply CLI overrides and validate the result
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        apply_serve_overrides(&mut config, &cli.serve_args());

        config.validate()?;
        Ok(config)
    }
}

fn apply_serve_overrides(config: &mut Settings, args: &ServeArgs) {
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref jobs_file) = args.jobs_file {
        config.scheduler.jobs_file = jobs_file.to_string_lossy().into_owned();
    }
    if let Some(level) = args.log_level {
        config.logger.level = level.as_str().to_string();
    }
}
