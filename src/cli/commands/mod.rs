//! CLI command implementations.

pub mod cancel;
pub mod decide;
pub mod definition;
pub mod directory;
pub mod init;
pub mod instance;
pub mod submit;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::initialize_database;
use crate::infrastructure::config::ConfigLoader;
use crate::services::SqliteApprovalEngine;

/// Load config and open the migrated database pool.
pub(crate) async fn open_pool() -> Result<SqlitePool> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    initialize_database(&config.database.url())
        .await
        .context("Failed to open database (run `quorum init` first?)")
}

/// Construct the engine over the configured database.
pub(crate) async fn open_engine() -> Result<SqliteApprovalEngine> {
    Ok(SqliteApprovalEngine::from_pool(open_pool().await?))
}
