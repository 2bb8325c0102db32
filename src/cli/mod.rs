//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{RunCommand, StatusCommand, ValidateCommand};

/// Automated Live2D model generation pipeline
#[derive(Debug, Parser, Clone)]
#[command(name = "live2dgen")]
#[command(version = "0.1.0")]
#[command(about = "Turn a character illustration into a rigged Live2D model", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the generation pipeline
    Run(RunCommand),

    /// Validate a configuration file
    Validate(ValidateCommand),

    /// Show run history and stage status
    Status(StatusCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;
