//! Workflow definition and agent rule management commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteDefinitionRepository;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{
    ActivationConditions, AgentRule, AgentRuleKind, CompletionRule, WorkflowDefinition,
};
use crate::domain::ports::DefinitionRepository;

#[derive(Args, Debug)]
pub struct DefinitionArgs {
    #[command(subcommand)]
    pub command: DefinitionCommands,
}

#[derive(Subcommand, Debug)]
pub enum DefinitionCommands {
    /// List registered workflow definitions
    List {
        /// Restrict to one object type
        #[arg(long)]
        object_type: Option<String>,
    },
    /// Show one definition with its steps and bound rules
    Show {
        /// Definition code
        code: String,
    },
    /// Import definitions and agent rules from a YAML bundle
    Import {
        /// Path to the YAML file
        file: PathBuf,
    },
    /// Activate a definition
    Activate { code: String },
    /// Deactivate a definition (live instances continue unaffected)
    Deactivate { code: String },
    /// List the agent rule catalog
    Rules,
}

// ── YAML import format ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ImportBundle {
    #[serde(default)]
    agent_rules: Vec<RuleImport>,
    #[serde(default)]
    definitions: Vec<DefinitionImport>,
}

#[derive(Debug, Deserialize)]
struct RuleImport {
    rule_name: String,
    #[serde(flatten)]
    kind: AgentRuleKind,
}

#[derive(Debug, Deserialize)]
struct DefinitionImport {
    code: String,
    name: String,
    object_type: String,
    #[serde(default)]
    activation: ActivationConditions,
    #[serde(default = "default_true")]
    is_active: bool,
    steps: Vec<StepImport>,
}

#[derive(Debug, Deserialize)]
struct StepImport {
    name: String,
    code: String,
    completion_rule: String,
    #[serde(default)]
    min_approvals: Option<u32>,
    /// Rule names bound to this step.
    agent_rules: Vec<String>,
}

const fn default_true() -> bool {
    true
}

// ── Output structs ──────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct DefinitionListOutput {
    definitions: Vec<WorkflowDefinition>,
}

impl CommandOutput for DefinitionListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["code", "name", "object type", "steps", "active"]);
        for def in &self.definitions {
            table.add_row(vec![
                def.code.clone(),
                def.name.clone(),
                def.object_type.clone(),
                def.steps.len().to_string(),
                if def.is_active { "yes" } else { "no" }.to_string(),
            ]);
        }
        render_list("definition", &table, self.definitions.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct DefinitionDetailOutput {
    definition: WorkflowDefinition,
    rule_names: HashMap<Uuid, String>,
}

impl CommandOutput for DefinitionDetailOutput {
    fn to_human(&self) -> String {
        let def = &self.definition;
        let mut lines = vec![
            format!("Definition: {} — {}", def.code, def.name),
            format!("Object type: {}", def.object_type),
            format!("Active: {}", if def.is_active { "yes" } else { "no" }),
            format!("Steps ({}):", def.steps.len()),
        ];
        for step in &def.steps {
            let rules: Vec<&str> = step
                .agent_rule_ids
                .iter()
                .map(|id| self.rule_names.get(id).map_or("<unknown>", String::as_str))
                .collect();
            lines.push(format!(
                "  {}. {} [{}] — rule: {}, approvers via: {}",
                step.step_sequence,
                step.name,
                step.code,
                step.completion_rule,
                rules.join(", ")
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct ImportOutput {
    rules_imported: usize,
    rules_skipped: usize,
    definitions_imported: usize,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        format!(
            "Imported {} agent rule(s) ({} already present), {} definition(s).",
            self.rules_imported, self.rules_skipped, self.definitions_imported
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct RuleListOutput {
    rules: Vec<AgentRule>,
}

impl CommandOutput for RuleListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "type", "parameters"]);
        for rule in &self.rules {
            let params = serde_json::to_value(&rule.kind)
                .ok()
                .and_then(|mut v| {
                    v.as_object_mut().map(|o| {
                        o.remove("rule_type");
                        serde_json::Value::Object(o.clone()).to_string()
                    })
                })
                .unwrap_or_default();
            table.add_row(vec![
                rule.rule_name.clone(),
                rule.kind.rule_type().to_string(),
                params,
            ]);
        }
        render_list("agent rule", &table, self.rules.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct ActivationOutput {
    code: String,
    is_active: bool,
}

impl CommandOutput for ActivationOutput {
    fn to_human(&self) -> String {
        format!(
            "Definition '{}' is now {}.",
            self.code,
            if self.is_active { "active" } else { "inactive" }
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// ── Command execution ───────────────────────────────────────────────────

pub async fn execute(args: DefinitionArgs, json_mode: bool) -> Result<()> {
    let pool = super::open_pool().await?;
    let repo = SqliteDefinitionRepository::new(pool);

    match args.command {
        DefinitionCommands::List { object_type } => {
            let definitions = repo.list_definitions(object_type.as_deref()).await?;
            output(&DefinitionListOutput { definitions }, json_mode);
        }
        DefinitionCommands::Show { code } => {
            let definition = repo
                .get_definition_by_code(&code)
                .await?
                .ok_or_else(|| anyhow!("Definition '{}' not found", code))?;

            let mut rule_names = HashMap::new();
            for step in &definition.steps {
                for rule_id in &step.agent_rule_ids {
                    if let Some(rule) = repo.get_agent_rule(*rule_id).await? {
                        rule_names.insert(*rule_id, rule.rule_name);
                    }
                }
            }
            output(&DefinitionDetailOutput { definition, rule_names }, json_mode);
        }
        DefinitionCommands::Import { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let bundle: ImportBundle =
                serde_yaml::from_str(&text).context("Failed to parse import bundle")?;
            let result = import_bundle(&repo, bundle).await?;
            output(&result, json_mode);
        }
        DefinitionCommands::Activate { code } => {
            let definition = repo
                .get_definition_by_code(&code)
                .await?
                .ok_or_else(|| anyhow!("Definition '{}' not found", code))?;
            repo.set_active(definition.id, true).await?;
            output(&ActivationOutput { code, is_active: true }, json_mode);
        }
        DefinitionCommands::Deactivate { code } => {
            let definition = repo
                .get_definition_by_code(&code)
                .await?
                .ok_or_else(|| anyhow!("Definition '{}' not found", code))?;
            repo.set_active(definition.id, false).await?;
            output(&ActivationOutput { code, is_active: false }, json_mode);
        }
        DefinitionCommands::Rules => {
            let rules = repo.list_agent_rules().await?;
            output(&RuleListOutput { rules }, json_mode);
        }
    }

    Ok(())
}

async fn import_bundle(
    repo: &SqliteDefinitionRepository,
    bundle: ImportBundle,
) -> Result<ImportOutput> {
    let mut rules_imported = 0;
    let mut rules_skipped = 0;

    for rule_import in bundle.agent_rules {
        if repo.get_agent_rule_by_name(&rule_import.rule_name).await?.is_some() {
            rules_skipped += 1;
            continue;
        }
        let rule = AgentRule::new(rule_import.rule_name.clone(), rule_import.kind);
        rule.validate()
            .map_err(|reason| anyhow!("Invalid rule '{}': {}", rule.rule_name, reason))?;
        repo.save_agent_rule(&rule).await?;
        rules_imported += 1;
    }

    let mut definitions_imported = 0;
    for def_import in bundle.definitions {
        let mut definition = WorkflowDefinition::new(
            def_import.code.clone(),
            def_import.name,
            def_import.object_type,
            def_import.activation,
        );
        definition.is_active = def_import.is_active;

        for step in def_import.steps {
            let completion_rule =
                CompletionRule::from_parts(&step.completion_rule, step.min_approvals).map_err(
                    |reason| anyhow!("Invalid step '{}' in '{}': {}", step.code, def_import.code, reason),
                )?;

            let mut rule_ids = Vec::with_capacity(step.agent_rules.len());
            for rule_name in &step.agent_rules {
                let rule = repo
                    .get_agent_rule_by_name(rule_name)
                    .await?
                    .ok_or_else(|| anyhow!("Unknown agent rule '{}' in step '{}'", rule_name, step.code))?;
                rule_ids.push(rule.id);
            }

            definition.add_step(step.name, step.code, completion_rule, rule_ids);
        }

        definition
            .validate()
            .map_err(|reason| anyhow!("Invalid definition '{}': {}", definition.code, reason))?;
        repo.save_definition(&definition).await?;
        definitions_imported += 1;
    }

    Ok(ImportOutput {
        rules_imported,
        rules_skipped,
        definitions_imported,
    })
}
