//! Command-line interface
//!
//! Parses arguments, merges them over the loaded configuration, sets up
//! logging and dispatches the serve command.

pub mod config_merger;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use parser::{Cli, Commands, Environment, LogLevel, ServeArgs};

use crate::config::Settings;
use crate::logger::init_logger;
use handlers::ServeCommandHandler;

/// Run the parsed command line to completion
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let merger = ConfigurationMerger::from_cli(&cli)?;
    let settings = merger.merge_cli_args(&cli)?;

    init_logger_from_settings(&settings)?;

    let args = cli.serve_args();
    ServeCommandHandler::new(settings, merger.environment())
        .execute(args.dry_run)
        .await?;
    Ok(())
}

/// Install the global tracing subscriber described by `settings`
pub fn init_logger_from_settings(settings: &Settings) -> anyhow::Result<()> {
    let config = settings.logger.clone().into_logger_config()?;
    init_logger(config)?;
    Ok(())
}
