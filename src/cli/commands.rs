//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run the pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: String,

    /// Use an existing character image instead of generating one
    #[arg(long, conflicts_with = "layer_dir")]
    pub character_image: Option<PathBuf>,

    /// Use an existing layer directory, skipping generation and segmentation
    #[arg(long)]
    pub layer_dir: Option<PathBuf>,

    /// Override the generation prompt from the config file
    #[arg(long)]
    pub prompt: Option<String>,
}

/// Validate a configuration file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the stage history of past runs
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: String,

    /// Run id to inspect; the most recent runs are listed when omitted
    pub run_id: Option<String>,

    /// Number of recent runs to list
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
