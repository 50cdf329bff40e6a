//! Subcommand enum definitions for CLI

use clap::Subcommand;
use std::path::PathBuf;

/// MDL0 model commands
#[derive(Subcommand)]
pub enum Mdl0Commands {
    /// Decode a model and print its structure and diagnostics
    Inspect {
        /// MDL0 file
        path: PathBuf,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a model and write it back out
    Rebuild {
        /// Source MDL0 file
        source: PathBuf,

        /// Destination MDL0 file
        destination: PathBuf,

        /// Write models that decoded with save-blocking advisories
        #[arg(long)]
        force: bool,
    },

    /// Validate every .mdl0 file under a directory
    Batch {
        /// Directory to search recursively
        dir: PathBuf,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },
}

/// RHST scene tree commands
#[derive(Subcommand)]
pub enum RhstCommands {
    /// Decode a scene tree and print a summary
    Inspect {
        /// RHST file
        path: PathBuf,

        /// Write the decoded scene as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
