//! Command-line interface for the quorum approval engine.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "quorum",
    version,
    about = "Context-driven multi-step approval workflow engine"
)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-oriented output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the project directory, config, and database
    Init(commands::init::InitArgs),
    /// Manage workflow definitions and agent rules
    Definition(commands::definition::DefinitionArgs),
    /// Manage the organizational directory
    Directory(commands::directory::DirectoryArgs),
    /// Submit a business object for approval
    Submit(commands::submit::SubmitArgs),
    /// Record an approval or rejection on an instance
    Decide(commands::decide::DecideArgs),
    /// Cancel (withdraw) a live instance
    Cancel(commands::cancel::CancelArgs),
    /// Inspect workflow instances
    Instance(commands::instance::InstanceArgs),
}

/// Print an error and exit non-zero. Conflict and configuration rejections
/// come through here as well; they are messages for the user, not panics.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let value = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
