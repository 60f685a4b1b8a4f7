//! Command-line interface for scout.
//!
//! One binary serves both sides of the pipeline: `scan` and `cleanup` run
//! on the capture device, the rest on the ingestion host.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, IngestCommand, ListCommand, ReportCommand, ScanCommand, SearchCommand,
};

/// scout - Wireless survey capture and analysis
///
/// Captures nearby access points into a record vault, ingests vaults into
/// a local database and tags every observation with configurable rules.
#[derive(Debug, Parser)]
#[command(name = "scout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a capture cycle and append it to the vault
    Scan(ScanCommand),

    /// Delete the vault and reset the locality counter
    Cleanup,

    /// Ingest a record file into the database
    Ingest(IngestCommand),

    /// Show tagged observations for a locality
    Report(ReportCommand),

    /// List ingested localities
    Localities(ListCommand),

    /// Search observations by network name or hardware address
    Search(SearchCommand),

    /// Show database and counter status
    Status(ListCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
