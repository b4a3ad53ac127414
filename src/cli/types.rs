//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::config::ConfigArgs;
use crate::cli::commands::run::RunArgs;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "stigmergy")]
#[command(about = "Stigmergy - agents coordinating through decaying traces", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .stigmergy/
    #[arg(short, long, global = true, env = "STIGMERGY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a YAML pipeline of template agents until it converges
    Run(RunArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}
