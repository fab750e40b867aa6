//! Implementation of the `quorum submit` command.

use anyhow::{anyhow, Result};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{ApprovalContext, AMOUNT_FIELD};
use crate::services::SubmissionOutcome;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Business object type (e.g. GL_DOCUMENT, PURCHASE_REQUISITION)
    pub object_type: String,

    /// Business object identifier
    pub object_id: String,

    /// Identity of the submitting requester
    #[arg(long)]
    pub requester: String,

    /// Monetary amount of the object, if any
    #[arg(long)]
    pub amount: Option<f64>,

    /// Additional context fields as KEY=VALUE (repeatable)
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
struct SubmitOutput {
    #[serde(flatten)]
    outcome: SubmissionOutcome,
}

impl CommandOutput for SubmitOutput {
    fn to_human(&self) -> String {
        match self.outcome.instance_id {
            Some(id) => format!("Approval required. Instance {id} created."),
            None => "No approval required.".to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Parse repeated KEY=VALUE pairs into a context snapshot.
fn build_context(amount: Option<f64>, pairs: &[String]) -> Result<ApprovalContext> {
    let mut context = ApprovalContext::new();
    if let Some(amount) = amount {
        context = context.with(AMOUNT_FIELD, amount);
    }
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid context pair '{}', expected KEY=VALUE", pair))?;
        context = context.with(key.trim(), value.trim());
    }
    Ok(context)
}

pub async fn execute(args: SubmitArgs, json_mode: bool) -> Result<()> {
    let engine = super::open_engine().await?;
    let context = build_context(args.amount, &args.context)?;

    let outcome = engine
        .submit_for_approval(&args.object_type, &args.object_id, &args.requester, context)
        .await?;

    output(&SubmitOutput { outcome }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_pairs_and_amount() {
        let ctx = build_context(
            Some(12_500.0),
            &["department_code=FIN".to_string(), "plant_code = P1".to_string()],
        )
        .unwrap();
        assert_eq!(ctx.amount(), Some(12_500.0));
        assert_eq!(ctx.get_str("department_code"), Some("FIN"));
        assert_eq!(ctx.get_str("plant_code"), Some("P1"));
    }

    #[test]
    fn test_build_context_rejects_malformed_pair() {
        assert!(build_context(None, &["no-equals-sign".to_string()]).is_err());
    }
}
