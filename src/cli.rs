//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

/// Article Tracker - watches a news sitemap and reports publishing progress
#[derive(Parser, Debug)]
#[command(name = "article-tracker", version, about)]
pub struct Cli {
    /// Path to config file (missing file = defaults + environment)
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Send a test notification and exit
    #[arg(long, conflicts_with = "once")]
    pub test: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
