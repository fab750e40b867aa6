//! Workflow instance inspection commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{ApproverId, InstanceStatus, StepDecision, WorkflowInstance};
use crate::domain::ports::InstanceFilter;

#[derive(Args, Debug)]
pub struct InstanceArgs {
    #[command(subcommand)]
    pub command: InstanceCommands,
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommands {
    /// Show an instance with its decision log and eligible approvers
    Show {
        /// Workflow instance identifier
        instance_id: Uuid,
    },
    /// List instances
    List {
        /// Filter by status (in_progress, approved, rejected, cancelled)
        #[arg(long)]
        status: Option<String>,
        /// Filter by object type
        #[arg(long)]
        object_type: Option<String>,
        /// Maximum rows
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// List instances awaiting an approver's decision
    Pending {
        /// Approver identity
        approver: String,
    },
}

// ── Output structs ──────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct InstanceDetailOutput {
    instance: WorkflowInstance,
    decisions: Vec<StepDecision>,
    eligible_approvers: BTreeSet<ApproverId>,
}

impl CommandOutput for InstanceDetailOutput {
    fn to_human(&self) -> String {
        let i = &self.instance;
        let mut lines = vec![
            format!("Instance: {}", i.id),
            format!("Object: {}/{}", i.object_type, i.object_id),
            format!("Requester: {}", i.requester_id),
            format!("Status: {} (step {})", i.status, i.current_step_sequence),
            format!("Created: {}", i.created_at.to_rfc3339()),
        ];

        if i.status == InstanceStatus::InProgress {
            if self.eligible_approvers.is_empty() {
                lines.push(
                    "Eligible approvers: none — resolution gap, manual intervention required"
                        .to_string(),
                );
            } else {
                let names: Vec<&str> =
                    self.eligible_approvers.iter().map(String::as_str).collect();
                lines.push(format!("Eligible approvers: {}", names.join(", ")));
            }
        }

        if self.decisions.is_empty() {
            lines.push("No decisions recorded.".to_string());
        } else {
            lines.push(format!("Decisions ({}):", self.decisions.len()));
            for d in &self.decisions {
                let comment = d
                    .comment
                    .as_deref()
                    .map(|c| format!(" — {}", truncate(c, 60)))
                    .unwrap_or_default();
                lines.push(format!(
                    "  step {}: {} by {} at {}{}",
                    d.step_sequence,
                    d.decision.as_str(),
                    d.approver_id,
                    d.decided_at.to_rfc3339(),
                    comment
                ));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct InstanceListOutput {
    instances: Vec<WorkflowInstance>,
}

impl CommandOutput for InstanceListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["instance", "object", "requester", "status", "step", "created"]);
        for i in &self.instances {
            table.add_row(vec![
                i.id.to_string(),
                format!("{}/{}", i.object_type, i.object_id),
                i.requester_id.clone(),
                i.status.to_string(),
                i.current_step_sequence.to_string(),
                i.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        render_list("instance", &table, self.instances.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// ── Command execution ───────────────────────────────────────────────────

pub async fn execute(args: InstanceArgs, json_mode: bool) -> Result<()> {
    let engine = super::open_engine().await?;

    match args.command {
        InstanceCommands::Show { instance_id } => {
            let instance = engine.get_instance(instance_id).await?;
            let decisions = engine.decision_log(instance_id).await?;
            let eligible_approvers = engine.eligible_approvers(instance_id).await?;
            output(
                &InstanceDetailOutput {
                    instance,
                    decisions,
                    eligible_approvers,
                },
                json_mode,
            );
        }
        InstanceCommands::List {
            status,
            object_type,
            limit,
        } => {
            let status = status
                .map(|s| {
                    InstanceStatus::from_str(&s).ok_or_else(|| anyhow!("Unknown status '{}'", s))
                })
                .transpose()?;
            let instances = engine
                .list_instances(InstanceFilter {
                    status,
                    object_type,
                    object_id: None,
                    limit: Some(limit),
                })
                .await?;
            output(&InstanceListOutput { instances }, json_mode);
        }
        InstanceCommands::Pending { approver } => {
            let instances = engine.pending_for_approver(&approver).await?;
            output(&InstanceListOutput { instances }, json_mode);
        }
    }

    Ok(())
}
