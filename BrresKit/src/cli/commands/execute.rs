//! Command execution implementations

use super::Commands;
use super::definitions::{Mdl0Commands, RhstCommands};
use super::{mdl0, rhst};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Mdl0 { command } => command.execute(),
            Commands::Rhst { command } => command.execute(),
        }
    }
}

impl Mdl0Commands {
    /// Execute the selected MDL0 command.
    ///
    /// # Errors
    /// Returns an error if the model cannot be read or written.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Mdl0Commands::Inspect { path, output } => mdl0::inspect(path, output.as_deref()),
            Mdl0Commands::Rebuild {
                source,
                destination,
                force,
            } => mdl0::rebuild(source, destination, *force),
            Mdl0Commands::Batch { dir, quiet } => mdl0::batch(dir, *quiet),
        }
    }
}

impl RhstCommands {
    /// Execute the selected RHST command.
    ///
    /// # Errors
    /// Returns an error if the scene tree cannot be read.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            RhstCommands::Inspect { path, output } => rhst::inspect(path, output.as_deref()),
        }
    }
}
