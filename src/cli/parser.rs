//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cron-driven webhook scheduler with a management API
#[derive(Parser, Debug)]
#[command(name = "hookcron")]
#[command(about = "Cron-driven webhook scheduler with a management API")]
#[command(long_about = "
hookcron calls HTTP webhooks on cron schedules and at one-shot reminder
times, optionally chaining a second webhook built from the first response.

EXAMPLES:
    # Start the server with default configuration
    hookcron

    # Start on a custom port with a specific jobs file
    hookcron serve --port 9090 --jobs-file /var/lib/hookcron/jobs.yaml

    # Use a custom configuration file
    hookcron --config /etc/hookcron/production.toml serve

    # Check configuration and every job schedule without starting
    hookcron serve --dry-run
")]
#[command(version = crate::build::CLAP_LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Loads this single TOML file instead of the layered config directory.
    /// The file must exist and be readable.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection (HOOKCRON_APP_ENV)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Log errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler and management API (default)
    ///
    /// Examples:
    ///   hookcron serve                     # Start with defaults
    ///   hookcron serve --host 127.0.0.1    # Local access only
    ///   hookcron serve --dry-run           # Validate without starting
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
    pub host: Option<String>,

    /// Port number to listen on (1-65535)
    #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
    pub port: Option<u16>,

    /// YAML file holding the job definitions
    #[arg(long, value_name = "FILE")]
    pub jobs_file: Option<PathBuf>,

    /// Log level override; wins over --verbose and --quiet
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Validate configuration and job schedules, then exit
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Arguments of the serve command; no subcommand means serve with defaults
    pub fn serve_args(&self) -> ServeArgs {
        match &self.command {
            Some(Commands::Serve(args)) => args.clone(),
            None => ServeArgs::default(),
        }
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["hookcron", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["hookcron"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.serve_args(), ServeArgs::default());
        assert!(!cli.verbose && !cli.quiet);
    }

    #[test]
    fn test_serve_arguments() {
        let cli = Cli::try_parse_from([
            "hookcron",
            "--env",
            "prod",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9090",
            "--jobs-file",
            "data/jobs.yaml",
            "--log-level",
            "warning",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.env, Some(Environment::Production));
        let args = cli.serve_args();
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, Some(9090));
        assert_eq!(args.jobs_file, Some(PathBuf::from("data/jobs.yaml")));
        assert_eq!(args.log_level, Some(LogLevel::Warn));
        assert!(args.dry_run);
    }

    #[test]
    fn test_port_zero_rejected() {
        assert!(Cli::try_parse_from(["hookcron", "serve", "--port", "0"]).is_err());
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["hookcron", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_environment_conversion() {
        let env: crate::config::Environment = Environment::Staging.into();
        assert_eq!(env, crate::config::Environment::Staging);
    }
}
