//! Command-line interface for the deployer.

mod commands;
mod output;

pub use commands::{Cli, Commands, EventsArgs, OutputFormat};
pub use output::OutputFormatter;
