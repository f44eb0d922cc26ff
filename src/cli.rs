mod help_text;

use crate::config::validate_sample_rate;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Integrity checking for append-only directory trees
#[derive(Parser, Debug)]
#[command(name = "hashcheck", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). Takes precedence over RUST_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Set the log level (off, error, warn, info, debug, trace). Takes precedence over RUST_LOG.
    #[arg(
        long,
        value_name = "LEVEL",
        global = true,
        conflicts_with = "verbose"
    )]
    pub log_level: Option<LevelFilter>,

    /// Read settings from this TOML file instead of $HASHCHECK_CONFIG
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Record modification times instead of content hashes
    #[arg(long, global = true)]
    pub metadata: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct Targets {
    /// Search each DIR for manifests and process every directory holding one
    #[arg(long)]
    pub find: bool,

    /// Directories to process
    #[arg(value_name = "DIR", default_value = ".")]
    pub dirs: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record every file of a tree that has no manifest yet
    Create {
        /// Directories to record
        #[arg(value_name = "DIR", default_value = ".")]
        dirs: Vec<PathBuf>,
    },

    /// Record files that are missing from the manifest
    Expand {
        #[command(flatten)]
        targets: Targets,
    },

    /// Re-record every file and compare against the manifest
    Verify {
        #[command(flatten)]
        targets: Targets,
    },

    /// Re-record only the files named in a list
    Subset {
        #[command(flatten)]
        targets: Targets,

        /// File listing the paths to check, one per line (default: DIR/.hashcheck.subset)
        #[arg(long, value_name = "FILE")]
        list: Option<PathBuf>,
    },

    /// Re-record a random fraction of the manifest
    #[command(long_about = help_text::SAMPLE_LONG_ABOUT)]
    Sample {
        #[command(flatten)]
        targets: Targets,

        /// Probability of selecting each entry, in (0, 1]
        #[arg(long, value_name = "RATE", value_parser = parse_rate)]
        rate: Option<f64>,

        /// Seed for a repeatable selection
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
    },

    /// Replace the committed manifest with the pending candidate
    Accept {
        #[command(flatten)]
        targets: Targets,
    },

    /// Report trees holding files newer than their manifest
    Review {
        #[command(flatten)]
        targets: Targets,
    },

    /// Record new files and propose dropping entries whose files are gone
    Update {
        #[command(flatten)]
        targets: Targets,
    },

    /// Synchronize the backup copy named in .hashcheck.backup
    #[command(long_about = help_text::BACKUP_LONG_ABOUT)]
    Backup {
        #[command(flatten)]
        targets: Targets,

        /// Apply changes without asking for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// List files with identical fingerprint and size across manifests
    Match {
        /// Directories whose manifests are compared, in order
        #[arg(value_name = "DIR", required = true)]
        dirs: Vec<PathBuf>,
    },
}

fn parse_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    validate_sample_rate(rate).map_err(|e| e.to_string())
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
