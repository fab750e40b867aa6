//! Implementation of the `quorum init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.database_initialized {
            lines.push("Database initialized at .quorum/quorum.db".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let quorum_dir = target_path.join(".quorum");

    if quorum_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            database_initialized: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    if args.force && quorum_dir.exists() {
        fs::remove_dir_all(&quorum_dir)
            .await
            .context("Failed to remove existing .quorum directory")?;
    }

    fs::create_dir_all(&quorum_dir)
        .await
        .context("Failed to create .quorum directory")?;

    let config_yaml =
        serde_yaml::to_string(&Config::default()).context("Failed to serialize default config")?;
    fs::write(quorum_dir.join("config.yaml"), config_yaml)
        .await
        .context("Failed to write config.yaml")?;

    let db_path = quorum_dir.join("quorum.db");
    initialize_database(&format!("sqlite:{}", db_path.display()))
        .await
        .context("Failed to initialize database")?;

    let output_data = InitOutput {
        success: true,
        message: format!("Initialized quorum project at {}", target_path.display()),
        initialized_path: target_path,
        database_initialized: true,
    };
    output(&output_data, json_mode);
    Ok(())
}
