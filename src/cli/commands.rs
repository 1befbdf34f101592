//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::director::EventsFilter;

/// Installs a CPI from its release and tears deployments down with it.
#[derive(Parser, Debug)]
#[command(name = "cpi-deployer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete the deployment described by a manifest.
    Delete {
        /// Path to the deployment manifest.
        manifest: PathBuf,

        /// Path to the deployment state file
        /// (defaults to `<manifest>-state.json` next to the manifest).
        #[arg(long, env = "CPI_DEPLOYER_STATE")]
        state: Option<PathBuf>,
    },

    /// List events recorded by a director.
    Events(EventsArgs),
}

/// Arguments of the `events` command.
#[derive(Args, Debug, Clone)]
pub struct EventsArgs {
    /// Director URL.
    #[arg(long, env = "CPI_DEPLOYER_DIRECTOR")]
    pub director: String,

    /// Show events with an id lower than this one.
    #[arg(long)]
    pub before_id: Option<String>,

    /// Show events before this time.
    #[arg(long)]
    pub before: Option<String>,

    /// Show events after this time.
    #[arg(long)]
    pub after: Option<String>,

    /// Show events of this deployment.
    #[arg(long)]
    pub deployment: Option<String>,

    /// Show events of this task.
    #[arg(long)]
    pub task: Option<String>,

    /// Show events of this instance.
    #[arg(long)]
    pub instance: Option<String>,
}

impl From<&EventsArgs> for EventsFilter {
    fn from(args: &EventsArgs) -> Self {
        Self {
            before_id: args.before_id.clone(),
            before: args.before.clone(),
            after: args.after.clone(),
            deployment: args.deployment.clone(),
            task: args.task.clone(),
            instance: args.instance.clone(),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
