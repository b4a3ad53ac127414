//! Stigmergy CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use stigmergy::cli::{Cli, Commands};
use stigmergy::infrastructure::logging::{LogConfig, LoggerImpl};
use stigmergy::{Config, ConfigLoader};

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

fn init_logging(cli: &Cli, config: &Config) -> Result<LoggerImpl> {
    let mut log_config =
        LogConfig::from_settings(&config.logging).context("Invalid logging configuration")?;
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    LoggerImpl::init(&log_config).context("Failed to initialize logging")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => stigmergy::cli::handle_error(&err, cli.json),
    };

    let _logger = match init_logging(&cli, &config) {
        Ok(logger) => logger,
        Err(err) => stigmergy::cli::handle_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => {
            stigmergy::cli::commands::run::execute(args, &config, cli.json).await
        }
        Commands::Config(args) => stigmergy::cli::commands::config::execute(args, &config, cli.json),
    };

    if let Err(err) = result {
        stigmergy::cli::handle_error(&err, cli.json);
    }
}
