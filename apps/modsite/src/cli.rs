//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// modsite - Go module ingestion pipeline
#[derive(Parser)]
#[command(name = "modsite")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch Go modules from a module proxy and store their packages")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to a log file
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use alternate state database
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Module proxy base URL
    #[arg(long, global = true, value_name = "URL")]
    pub proxy: Option<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one module version and store the result
    Fetch {
        /// Module path, or `std` for the standard library
        module: String,

        /// Version, or one of latest, master, main
        #[arg(default_value = "latest")]
        version: String,
    },

    /// Process module versions through the work queue
    Enqueue {
        /// Tasks of the form module@version
        #[arg(required = true, value_name = "MODULE@VERSION")]
        tasks: Vec<String>,

        /// Number of concurrent workers (0=auto)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Show the recorded processing state of a module version
    State {
        /// Module path
        module: String,

        /// Version as it was requested
        version: String,
    },

    /// Exclude a module path prefix from processing
    Exclude {
        /// Path prefix; every module path starting with it is excluded
        prefix: String,

        /// Why the prefix is excluded
        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Process module versions and report fetches while they are in progress
    Inflight {
        /// Tasks of the form module@version
        #[arg(required = true, value_name = "MODULE@VERSION")]
        tasks: Vec<String>,

        /// Milliseconds between reports
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

/// Split `module@version` at its last `@`.
pub fn parse_task(task: &str) -> Option<(&str, &str)> {
    let (module, version) = task.rsplit_once('@')?;
    (!module.is_empty() && !version.is_empty()).then_some((module, version))
}
