//! Implementation of the `quorum cancel` command.

use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::InstanceStatus;

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Workflow instance identifier
    pub instance_id: Uuid,

    /// Identity requesting the withdrawal (for the audit trail)
    #[arg(long)]
    pub requested_by: String,
}

#[derive(Debug, serde::Serialize)]
struct CancelOutput {
    instance_id: Uuid,
    status: InstanceStatus,
}

impl CommandOutput for CancelOutput {
    fn to_human(&self) -> String {
        format!("Instance {} is now {}.", self.instance_id, self.status)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CancelArgs, json_mode: bool) -> Result<()> {
    let engine = super::open_engine().await?;
    let status = engine.cancel(args.instance_id, &args.requested_by).await?;

    output(
        &CancelOutput {
            instance_id: args.instance_id,
            status,
        },
        json_mode,
    );
    Ok(())
}
