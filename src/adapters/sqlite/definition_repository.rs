//! SQLite implementation of the DefinitionRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    ActivationConditions, AgentRule, AgentRuleKind, CompletionRule, WorkflowDefinition,
    WorkflowStep,
};
use crate::domain::ports::DefinitionRepository;

use super::{is_unique_violation, parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteDefinitionRepository {
    pool: SqlitePool,
}

impl SqliteDefinitionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_steps(&self, workflow_id: Uuid) -> EngineResult<Vec<WorkflowStep>> {
        let rows: Vec<StepRow> = sqlx::query_as(
            "SELECT id, workflow_id, step_sequence, name, code, completion_rule, min_approvals
             FROM workflow_steps WHERE workflow_id = ? ORDER BY step_sequence",
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut steps = Vec::with_capacity(rows.len());
        for row in rows {
            let mut step: WorkflowStep = row.try_into()?;
            let bindings: Vec<(String,)> = sqlx::query_as(
                "SELECT agent_rule_id FROM step_agent_bindings WHERE step_id = ?",
            )
            .bind(step.id.to_string())
            .fetch_all(&self.pool)
            .await?;
            step.agent_rule_ids = bindings
                .into_iter()
                .map(|(id,)| parse_uuid(&id))
                .collect::<EngineResult<Vec<_>>>()?;
            steps.push(step);
        }
        Ok(steps)
    }

    async fn load_definition(&self, row: DefinitionRow) -> EngineResult<WorkflowDefinition> {
        let mut definition: WorkflowDefinition = row.try_into()?;
        definition.steps = self.load_steps(definition.id).await?;
        Ok(definition)
    }
}

#[async_trait]
impl DefinitionRepository for SqliteDefinitionRepository {
    async fn save_definition(&self, definition: &WorkflowDefinition) -> EngineResult<()> {
        let activation_json = serde_json::to_string(&definition.activation)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO workflow_definitions (id, code, name, object_type, activation_json, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(definition.id.to_string())
        .bind(&definition.code)
        .bind(&definition.name)
        .bind(&definition.object_type)
        .bind(&activation_json)
        .bind(i32::from(definition.is_active))
        .bind(definition.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(EngineError::InvalidDefinition {
                    code: definition.code.clone(),
                    reason: "A definition with this code already exists".to_string(),
                });
            }
            return Err(e.into());
        }

        for step in &definition.steps {
            sqlx::query(
                "INSERT INTO workflow_steps (id, workflow_id, step_sequence, name, code, completion_rule, min_approvals)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(step.id.to_string())
            .bind(definition.id.to_string())
            .bind(i64::from(step.step_sequence))
            .bind(&step.name)
            .bind(&step.code)
            .bind(step.completion_rule.as_str())
            .bind(step.completion_rule.min_approvals().map(i64::from))
            .execute(&mut *tx)
            .await?;

            for rule_id in &step.agent_rule_ids {
                sqlx::query(
                    "INSERT OR IGNORE INTO step_agent_bindings (step_id, agent_rule_id) VALUES (?, ?)",
                )
                .bind(step.id.to_string())
                .bind(rule_id.to_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_definition(&self, id: Uuid) -> EngineResult<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as(
            "SELECT * FROM workflow_definitions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_definition(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_definition_by_code(&self, code: &str) -> EngineResult<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as(
            "SELECT * FROM workflow_definitions WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_definition(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_definitions(
        &self,
        object_type: Option<&str>,
    ) -> EngineResult<Vec<WorkflowDefinition>> {
        let rows: Vec<DefinitionRow> = match object_type {
            Some(ot) => {
                sqlx::query_as(
                    "SELECT * FROM workflow_definitions WHERE object_type = ? ORDER BY code",
                )
                .bind(ot)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM workflow_definitions ORDER BY code")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            definitions.push(self.load_definition(row).await?);
        }
        Ok(definitions)
    }

    async fn active_for_object_type(
        &self,
        object_type: &str,
    ) -> EngineResult<Vec<WorkflowDefinition>> {
        let rows: Vec<DefinitionRow> = sqlx::query_as(
            "SELECT * FROM workflow_definitions WHERE object_type = ? AND is_active = 1 ORDER BY code",
        )
        .bind(object_type)
        .fetch_all(&self.pool)
        .await?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            definitions.push(self.load_definition(row).await?);
        }
        Ok(definitions)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> EngineResult<()> {
        let result = sqlx::query("UPDATE workflow_definitions SET is_active = ? WHERE id = ?")
            .bind(i32::from(is_active))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::DefinitionNotFound(id));
        }
        Ok(())
    }

    async fn save_agent_rule(&self, rule: &AgentRule) -> EngineResult<()> {
        let kind_json = serde_json::to_string(&rule.kind)?;

        let result = sqlx::query(
            "INSERT INTO agent_rules (id, rule_name, rule_json, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(rule.id.to_string())
        .bind(&rule.rule_name)
        .bind(&kind_json)
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(EngineError::InvalidAgentRule {
                rule_name: rule.rule_name.clone(),
                reason: "A rule with this name already exists".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_agent_rule(&self, id: Uuid) -> EngineResult<Option<AgentRule>> {
        let row: Option<AgentRuleRow> = sqlx::query_as(
            "SELECT * FROM agent_rules WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_agent_rule_by_name(&self, rule_name: &str) -> EngineResult<Option<AgentRule>> {
        let row: Option<AgentRuleRow> = sqlx::query_as(
            "SELECT * FROM agent_rules WHERE rule_name = ?",
        )
        .bind(rule_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_agent_rules(&self) -> EngineResult<Vec<AgentRule>> {
        let rows: Vec<AgentRuleRow> = sqlx::query_as("SELECT * FROM agent_rules ORDER BY rule_name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// ============================================================================
// Row types for sqlx
// ============================================================================

#[derive(sqlx::FromRow)]
struct DefinitionRow {
    id: String,
    code: String,
    name: String,
    object_type: String,
    activation_json: String,
    is_active: i32,
    created_at: String,
}

impl TryFrom<DefinitionRow> for WorkflowDefinition {
    type Error = EngineError;

    fn try_from(row: DefinitionRow) -> Result<Self, Self::Error> {
        let activation: ActivationConditions = serde_json::from_str(&row.activation_json)?;
        Ok(WorkflowDefinition {
            id: parse_uuid(&row.id)?,
            code: row.code,
            name: row.name,
            object_type: row.object_type,
            activation,
            is_active: row.is_active != 0,
            steps: Vec::new(), // loaded separately
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: String,
    workflow_id: String,
    step_sequence: i64,
    name: String,
    code: String,
    completion_rule: String,
    min_approvals: Option<i64>,
}

impl TryFrom<StepRow> for WorkflowStep {
    type Error = EngineError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let completion_rule = CompletionRule::from_parts(
            &row.completion_rule,
            row.min_approvals.map(|n| n as u32),
        )
        .map_err(|reason| EngineError::InvalidDefinition {
            code: row.code.clone(),
            reason,
        })?;

        Ok(WorkflowStep {
            id: parse_uuid(&row.id)?,
            workflow_id: parse_uuid(&row.workflow_id)?,
            step_sequence: row.step_sequence as u32,
            name: row.name,
            code: row.code,
            completion_rule,
            agent_rule_ids: Vec::new(), // loaded separately
        })
    }
}

#[derive(sqlx::FromRow)]
struct AgentRuleRow {
    id: String,
    rule_name: String,
    rule_json: String,
    created_at: String,
}

impl TryFrom<AgentRuleRow> for AgentRule {
    type Error = EngineError;

    fn try_from(row: AgentRuleRow) -> Result<Self, Self::Error> {
        let kind: AgentRuleKind = serde_json::from_str(&row.rule_json)?;
        Ok(AgentRule {
            id: parse_uuid(&row.id)?,
            rule_name: row.rule_name,
            kind,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{ActivationConditions, FieldScope};

    async fn setup_test_repo() -> SqliteDefinitionRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteDefinitionRepository::new(pool)
    }

    fn sample_rule() -> AgentRule {
        AgentRule::new("plant-managers", AgentRuleKind::Role {
            role_code: "PLANT_MANAGER".to_string(),
            org_unit_field: Some("plant_code".to_string()),
        })
    }

    #[tokio::test]
    async fn test_save_and_load_definition_with_steps() {
        let repo = setup_test_repo().await;

        let rule = sample_rule();
        repo.save_agent_rule(&rule).await.unwrap();

        let mut def = WorkflowDefinition::new(
            "PR-STD",
            "Standard purchase requisition",
            "PURCHASE_REQUISITION",
            ActivationConditions::always()
                .with_amount(Some(1_000.0), None)
                .with_field("plant_code", FieldScope::Global),
        );
        def.add_step("Plant review", "PLANT", CompletionRule::Any, vec![rule.id]);
        def.add_step(
            "Joint sign-off",
            "JOINT",
            CompletionRule::MinN { min_approvals: 2 },
            vec![rule.id],
        );
        repo.save_definition(&def).await.unwrap();

        let loaded = repo.get_definition(def.id).await.unwrap().unwrap();
        assert_eq!(loaded.code, "PR-STD");
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.steps[0].step_sequence, 1);
        assert_eq!(loaded.steps[1].completion_rule, CompletionRule::MinN { min_approvals: 2 });
        assert_eq!(loaded.steps[0].agent_rule_ids, vec![rule.id]);
        assert_eq!(loaded.activation, def.activation);
    }

    #[tokio::test]
    async fn test_duplicate_code_is_a_configuration_error() {
        let repo = setup_test_repo().await;
        let def = WorkflowDefinition::new("DUP", "One", "GL_DOCUMENT", ActivationConditions::always());
        repo.save_definition(&def).await.unwrap();

        let again = WorkflowDefinition::new("DUP", "Two", "GL_DOCUMENT", ActivationConditions::always());
        let err = repo.save_definition(&again).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition { .. }));
    }

    #[tokio::test]
    async fn test_active_for_object_type_excludes_inactive() {
        let repo = setup_test_repo().await;

        let active = WorkflowDefinition::new("A", "Active", "GL_DOCUMENT", ActivationConditions::always());
        let mut inactive =
            WorkflowDefinition::new("B", "Inactive", "GL_DOCUMENT", ActivationConditions::always());
        inactive.is_active = false;

        repo.save_definition(&active).await.unwrap();
        repo.save_definition(&inactive).await.unwrap();

        let found = repo.active_for_object_type("GL_DOCUMENT").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "A");

        repo.set_active(active.id, false).await.unwrap();
        assert!(repo.active_for_object_type("GL_DOCUMENT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_agent_rule_round_trip() {
        let repo = setup_test_repo().await;
        let rule = sample_rule();
        repo.save_agent_rule(&rule).await.unwrap();

        let by_name = repo.get_agent_rule_by_name("plant-managers").await.unwrap().unwrap();
        assert_eq!(by_name.kind, rule.kind);

        let dup = AgentRule::new("plant-managers", AgentRuleKind::Hierarchy { levels: 1 });
        assert!(matches!(
            repo.save_agent_rule(&dup).await.unwrap_err(),
            EngineError::InvalidAgentRule { .. }
        ));
    }

    #[tokio::test]
    async fn test_min_n_without_min_is_rejected_on_load() {
        let repo = setup_test_repo().await;
        let def = WorkflowDefinition::new("BAD", "Bad", "GL_DOCUMENT", ActivationConditions::always());
        repo.save_definition(&def).await.unwrap();

        // Write a structurally invalid step directly, bypassing the domain.
        sqlx::query(
            "INSERT INTO workflow_steps (id, workflow_id, step_sequence, name, code, completion_rule, min_approvals)
             VALUES (?, ?, 1, 'Broken', 'BRK', 'MIN_N', NULL)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(def.id.to_string())
        .execute(&repo.pool)
        .await
        .unwrap();

        let err = repo.get_definition(def.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition { .. }));
    }
}
