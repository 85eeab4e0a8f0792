//! CLI argument parsing with clap

use crate::config::{Config, TransferMode};
use crate::period::Period;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Media Catalog - resumable media indexing and period transfers
///
/// Indexes photos and videos under a directory (content hash plus the most
/// plausible capture date), then moves or copies one month at a time into
/// a target library, keeping the largest copy of each file name.
#[derive(Parser, Debug)]
#[command(name = "media-catalog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads for parallel hashing (0 = auto)
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a directory, resuming an interrupted scan when one is pending
    Index {
        /// Directory to index
        directory: PathBuf,

        /// Base path of the index snapshots
        #[arg(short, long, default_value = "media_index.json", env = "MEDIA_CATALOG_INDEX")]
        output: PathBuf,

        /// Re-walk the directory instead of reusing the cached path list
        #[arg(short, long)]
        update_base: bool,

        /// Stop after this many files; run again to continue
        #[arg(short = 'l', long)]
        file_limit: Option<usize>,

        /// Files processed between two checkpoint writes
        #[arg(long)]
        checkpoint_interval: Option<usize>,
    },

    /// Transfer one month of indexed files into a target library
    Transfer {
        /// Month to transfer (YYYY-MM)
        period: Period,

        /// Library root; files land in <TARGET>/<YYYY-MM>
        target: PathBuf,

        /// Base path of the index snapshots
        #[arg(short, long, default_value = "media_index.json", env = "MEDIA_CATALOG_INDEX")]
        index: PathBuf,

        /// File operation mode
        #[arg(short = 'O', long, value_enum)]
        mode: Option<TransferMode>,

        /// Dry run mode - show what would be done without doing it
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Show statistics of the latest index
    Stats {
        /// Base path of the index snapshots
        #[arg(short, long, default_value = "media_index.json", env = "MEDIA_CATALOG_INDEX")]
        index: PathBuf,
    },

    /// Write a configuration file with default settings
    InitConfig {
        /// Destination of the TOML file
        #[arg(default_value = "media-catalog.toml")]
        path: PathBuf,
    },
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Short name of the subcommand, used for log naming
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Command::Index { .. } => "Index",
            Command::Transfer { .. } => "Transfer",
            Command::Stats { .. } => "Stats",
            Command::InitConfig { .. } => "InitConfig",
        }
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.verbose {
            config.verbose = true;
        }

        match self.command {
            Command::Index {
                checkpoint_interval: Some(interval),
                ..
            } => {
                config.checkpoint_interval = interval;
            }
            Command::Transfer { mode, dry_run, .. } => {
                if let Some(mode) = mode {
                    config.transfer_mode = mode;
                }
                if dry_run {
                    config.dry_run = true;
                }
            }
            _ => {}
        }

        config
    }
}
