use std::path::PathBuf;

use clap::{Parser, Subcommand};
use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "aegisx-agent",
    about = "AegisX firewall policy agent",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level override (takes precedence over config file)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Log format: json (default, production) or text (development)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply the policy directory once, then hot-reload on an interval
    /// until SIGINT/SIGTERM (the default when no subcommand is given)
    Run,

    /// Parse, compile and apply policies once
    Apply {
        /// Policy file to apply; the configured policy directory when absent
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show what would change if the given policies were applied
    Diff {
        /// Policy file to diff against the live ruleset
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the live ruleset of the managed table
    Status,

    /// Restore the most recent rollback snapshot
    Rollback,

    /// Remove the managed table from the kernel
    Flush,

    /// Display version information
    Version,
}

pub fn parse() -> Cli {
    Cli::parse()
}
