pub mod definitions;
pub mod execute;
pub mod mdl0;
pub mod rhst;

use clap::Subcommand;

use definitions::{Mdl0Commands, RhstCommands};

#[derive(Subcommand)]
pub enum Commands {
    /// MDL0 model operations (inspect, rebuild, batch validation)
    Mdl0 {
        #[command(subcommand)]
        command: Mdl0Commands,
    },

    /// RHST scene tree operations
    Rhst {
        #[command(subcommand)]
        command: RhstCommands,
    },
}
