//! Organizational directory management commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

use crate::adapters::sqlite::SqliteOrgDirectory;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{DomainApprover, OrgMember, RoleAssignment};

#[derive(Args, Debug)]
pub struct DirectoryArgs {
    #[command(subcommand)]
    pub command: DirectoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum DirectoryCommands {
    /// Import members, role assignments, and domain approvers from YAML
    Import {
        /// Path to the YAML file
        file: PathBuf,
    },
    /// List directory members
    List,
}

#[derive(Debug, Deserialize)]
struct DirectoryBundle {
    #[serde(default)]
    members: Vec<OrgMember>,
    #[serde(default)]
    role_assignments: Vec<RoleAssignment>,
    #[serde(default)]
    domain_approvers: Vec<DomainApprover>,
}

#[derive(Debug, serde::Serialize)]
struct DirectoryImportOutput {
    members: usize,
    role_assignments: usize,
    domain_approvers: usize,
}

impl CommandOutput for DirectoryImportOutput {
    fn to_human(&self) -> String {
        format!(
            "Imported {} member(s), {} role assignment(s), {} domain approver(s).",
            self.members, self.role_assignments, self.domain_approvers
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct MemberListOutput {
    members: Vec<OrgMember>,
}

impl CommandOutput for MemberListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["member", "name", "manager", "department", "plant", "active"]);
        for m in &self.members {
            table.add_row(vec![
                m.member_id.clone(),
                m.name.clone(),
                m.manager_id.clone().unwrap_or_else(|| "-".to_string()),
                m.department_code.clone().unwrap_or_else(|| "-".to_string()),
                m.plant_code.clone().unwrap_or_else(|| "-".to_string()),
                if m.is_active { "yes" } else { "no" }.to_string(),
            ]);
        }
        render_list("member", &table, self.members.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DirectoryArgs, json_mode: bool) -> Result<()> {
    let pool = super::open_pool().await?;
    let directory = SqliteOrgDirectory::new(pool);

    match args.command {
        DirectoryCommands::Import { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let bundle: DirectoryBundle =
                serde_yaml::from_str(&text).context("Failed to parse directory bundle")?;

            for member in &bundle.members {
                directory.upsert_member(member).await?;
            }
            for assignment in &bundle.role_assignments {
                directory.upsert_role_assignment(assignment).await?;
            }
            for approver in &bundle.domain_approvers {
                directory.upsert_domain_approver(approver).await?;
            }

            output(
                &DirectoryImportOutput {
                    members: bundle.members.len(),
                    role_assignments: bundle.role_assignments.len(),
                    domain_approvers: bundle.domain_approvers.len(),
                },
                json_mode,
            );
        }
        DirectoryCommands::List => {
            let members = directory.list_members().await?;
            output(&MemberListOutput { members }, json_mode);
        }
    }

    Ok(())
}
