//! Command-line arguments and configuration.

use clap::{Parser, Subcommand};
use tracing::Level;

/// Default account name for development storage.
pub const DEFAULT_ACCOUNT: &str = "devstoreaccount1";

/// Default cap on the bytes one download returns (256 MiB).
pub const DEFAULT_MAX_DOWNLOAD_SIZE: u64 = 256 * 1024 * 1024;

/// Command-line arguments for the diagnostic tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "azurite-core")]
#[command(about = "Lease, range, condition and tag query core of an Azure Blob Storage emulator")]
#[command(version)]
pub struct Args {
    /// Enable debug logging.
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Enable silent mode (minimal logging).
    #[arg(long, short = 's', global = true)]
    pub silent: bool,

    /// Account name used for request contexts.
    #[arg(long, default_value = DEFAULT_ACCOUNT, global = true)]
    pub account: String,

    /// Largest number of bytes a single download may return.
    #[arg(long, default_value_t = DEFAULT_MAX_DOWNLOAD_SIZE, global = true)]
    pub max_download_size: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Evaluate a tag predicate against a tag set.
    Tags {
        /// Predicate, e.g. "project = 'alpha' AND @container = 'logs'".
        predicate: String,

        /// Tags as key=value pairs.
        #[arg(value_name = "KEY=VALUE")]
        tags: Vec<String>,

        /// Container name bound to @container.
        #[arg(long)]
        container: Option<String>,
    },

    /// Apply page writes and clears to an empty page blob and print its ranges.
    Ranges {
        /// Operations such as write:0-511 or clear:256-511.
        #[arg(value_name = "OP")]
        ops: Vec<String>,

        /// Blob size; when given, also print the zero-filled partition.
        #[arg(long)]
        size: Option<u64>,
    },
}

/// Configuration derived from command-line arguments.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default account for request contexts.
    pub account: String,
    /// Enable debug logging.
    pub debug: bool,
    /// Enable silent mode.
    pub silent: bool,
    /// Largest number of bytes a single download may return.
    pub max_download_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
            debug: false,
            silent: false,
            max_download_size: DEFAULT_MAX_DOWNLOAD_SIZE,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            account: args.account.clone(),
            debug: args.debug,
            silent: args.silent,
            max_download_size: args.max_download_size,
        }
    }
}

impl Config {
    /// Maximum log level; debug wins over silent.
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.silent {
            Level::ERROR
        } else {
            Level::INFO
        }
    }
}
