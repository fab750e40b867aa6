//! Implementation of the `quorum decide` command.

use anyhow::Result;
use clap::{Args, ValueEnum};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Decision;
use crate::services::DecisionReceipt;

#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Workflow instance identifier
    pub instance_id: Uuid,

    /// The verdict to record
    #[arg(value_enum)]
    pub decision: DecisionArg,

    /// Identity of the deciding approver
    #[arg(long)]
    pub approver: String,

    /// Optional free-text comment
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DecisionArg {
    Approve,
    Reject,
}

impl From<DecisionArg> for Decision {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Approve => Decision::Approve,
            DecisionArg::Reject => Decision::Reject,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct DecideOutput {
    #[serde(flatten)]
    receipt: DecisionReceipt,
}

impl CommandOutput for DecideOutput {
    fn to_human(&self) -> String {
        format!(
            "Decision recorded. Instance {} is {} (step {}).",
            self.receipt.instance_id, self.receipt.status, self.receipt.current_step_sequence
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DecideArgs, json_mode: bool) -> Result<()> {
    let engine = super::open_engine().await?;

    let receipt = engine
        .decide(
            args.instance_id,
            &args.approver,
            args.decision.into(),
            args.comment,
        )
        .await?;

    output(&DecideOutput { receipt }, json_mode);
    Ok(())
}
