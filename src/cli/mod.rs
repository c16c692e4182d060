pub mod app;

use clap::{Args, Parser, Subcommand};
use event_archiver::config::{
    DEFAULT_ACTIVE_COLLECTION, DEFAULT_ARCHIVE_COLLECTION, DEFAULT_INACTIVITY_DAYS,
    DEFAULT_REGISTRATION_DAYS,
};
use event_archiver::{ArchiveStrategy, DurabilityMode};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "event-archiver",
    version,
    about = "Archive inactive users from the event store and write a dated report"
)]
pub struct Cli {
    /// Directory of the document store
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Collection holding current user events
    #[arg(long, global = true, default_value = DEFAULT_ACTIVE_COLLECTION)]
    pub active_collection: String,

    /// Collection receiving archived users
    #[arg(long, global = true, default_value = DEFAULT_ARCHIVE_COLLECTION)]
    pub archive_collection: String,

    /// WAL durability: sync, async or none
    #[arg(long, global = true, default_value = "sync")]
    pub durability: DurabilityMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Archive inactive users and write the report
    Run(RunArgs),
    /// Load a JSON array of event documents into the active collection
    Import {
        file: PathBuf,
    },
    /// Write a collection as a JSON array of documents
    Export {
        /// Collection to export (defaults to the archive collection)
        #[arg(long)]
        collection: Option<String>,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show record and user counts per collection
    Stats,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Days without activity before a user is archived
    #[arg(long, default_value_t = DEFAULT_INACTIVITY_DAYS)]
    pub inactive_days: u32,

    /// Minimum account age in days
    #[arg(long, default_value_t = DEFAULT_REGISTRATION_DAYS)]
    pub registration_days: u32,

    /// Directory receiving the dated report
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,

    /// atomic or sequential
    #[arg(long, default_value = "atomic")]
    pub strategy: ArchiveStrategy,

    /// List candidates without moving anything or writing a report
    #[arg(long)]
    pub dry_run: bool,
}
