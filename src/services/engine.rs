//! The external-facing submission API.
//!
//! `ApprovalEngine` is the request/response contract consumed by the other
//! modules (finance, procurement, materials): submit an object for approval,
//! record a decision, cancel, and read status projections. It composes the
//! definition selector and the instance manager; nothing here holds state
//! beyond the shared repositories.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::adapters::sqlite::{
    SqliteDefinitionRepository, SqliteInstanceRepository, SqliteOrgDirectory,
};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    ApprovalContext, ApproverId, Decision, InstanceStatus, StepDecision, WorkflowInstance,
};
use crate::domain::ports::{
    DefinitionRepository, InstanceFilter, InstanceRepository, OrgDirectory,
};
use crate::services::instance_manager::{DecisionReceipt, InstanceManager};
use crate::services::selector::DefinitionSelector;

/// Response to `submit_for_approval`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
}

pub struct ApprovalEngine<D, I, G>
where
    D: DefinitionRepository,
    I: InstanceRepository,
    G: OrgDirectory,
{
    selector: DefinitionSelector<D>,
    manager: InstanceManager<D, I, G>,
    instances: Arc<I>,
}

/// The engine wired to its SQLite adapters, as deployed.
pub type SqliteApprovalEngine =
    ApprovalEngine<SqliteDefinitionRepository, SqliteInstanceRepository, SqliteOrgDirectory>;

impl SqliteApprovalEngine {
    /// Construct the engine over one shared connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        let definitions = Arc::new(SqliteDefinitionRepository::new(pool.clone()));
        let instances = Arc::new(SqliteInstanceRepository::new(pool.clone()));
        let directory = Arc::new(SqliteOrgDirectory::new(pool));
        Self::new(definitions, instances, directory)
    }
}

impl<D, I, G> ApprovalEngine<D, I, G>
where
    D: DefinitionRepository,
    I: InstanceRepository,
    G: OrgDirectory,
{
    pub fn new(definitions: Arc<D>, instances: Arc<I>, directory: Arc<G>) -> Self {
        Self {
            selector: DefinitionSelector::new(definitions.clone()),
            manager: InstanceManager::new(definitions, instances.clone(), directory),
            instances,
        }
    }

    /// Submit a business object for approval.
    ///
    /// When no active definition matches the context, the object does not
    /// require approval and no instance is created.
    pub async fn submit_for_approval(
        &self,
        object_type: &str,
        object_id: &str,
        requester_id: &str,
        context: ApprovalContext,
    ) -> EngineResult<SubmissionOutcome> {
        let Some(definition) = self.selector.select(object_type, &context).await? else {
            info!(object_type, object_id, "No matching definition; approval not required");
            return Ok(SubmissionOutcome {
                requires_approval: false,
                instance_id: None,
            });
        };

        let instance = self
            .manager
            .create_instance(&definition, object_id, requester_id, context)
            .await?;

        Ok(SubmissionOutcome {
            requires_approval: true,
            instance_id: Some(instance.id),
        })
    }

    /// Record an approver's decision on the instance's current step.
    pub async fn decide(
        &self,
        instance_id: Uuid,
        approver_id: &str,
        decision: Decision,
        comment: Option<String>,
    ) -> EngineResult<DecisionReceipt> {
        self.manager.decide(instance_id, approver_id, decision, comment).await
    }

    /// Withdraw a live instance on behalf of the originating module.
    pub async fn cancel(&self, instance_id: Uuid, requested_by: &str) -> EngineResult<InstanceStatus> {
        self.manager.cancel(instance_id, requested_by).await
    }

    /// Read-only instance projection for status display.
    pub async fn get_instance(&self, instance_id: Uuid) -> EngineResult<WorkflowInstance> {
        self.instances
            .get(instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound(instance_id))
    }

    /// The current step's snapshotted approver pool. Terminal instances
    /// have nobody left to act and return the empty set.
    pub async fn eligible_approvers(&self, instance_id: Uuid) -> EngineResult<BTreeSet<ApproverId>> {
        let instance = self.get_instance(instance_id).await?;
        if instance.is_terminal() {
            return Ok(BTreeSet::new());
        }
        self.instances
            .pool_for_step(instance_id, instance.current_step_sequence)
            .await
    }

    /// The full decision log, for audit display.
    pub async fn decision_log(&self, instance_id: Uuid) -> EngineResult<Vec<StepDecision>> {
        self.get_instance(instance_id).await?;
        self.instances.decisions(instance_id).await
    }

    /// Instances awaiting a given approver's decision.
    pub async fn pending_for_approver(
        &self,
        approver_id: &str,
    ) -> EngineResult<Vec<WorkflowInstance>> {
        self.instances.pending_for_approver(approver_id).await
    }

    /// Instance listing for operational display.
    pub async fn list_instances(&self, filter: InstanceFilter) -> EngineResult<Vec<WorkflowInstance>> {
        self.instances.list(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{
        ActivationConditions, AgentRule, AgentRuleKind, CompletionRule, WorkflowDefinition,
    };

    async fn setup() -> (SqliteApprovalEngine, SqlitePool) {
        let pool = create_migrated_test_pool().await.unwrap();
        (SqliteApprovalEngine::from_pool(pool.clone()), pool)
    }

    async fn seed_any_definition(pool: &SqlitePool, object_type: &str, approvers: &[&str]) {
        let definitions = SqliteDefinitionRepository::new(pool.clone());
        let rule = AgentRule::new(
            format!("{object_type}-approvers"),
            AgentRuleKind::ExplicitList {
                approvers: approvers.iter().map(|a| (*a).to_string()).collect(),
            },
        );
        definitions.save_agent_rule(&rule).await.unwrap();

        let mut def = WorkflowDefinition::new(
            format!("{object_type}-STD"),
            "Standard",
            object_type,
            ActivationConditions::always().with_amount(Some(1_000.0), None),
        );
        def.add_step("Review", "REV", CompletionRule::Any, vec![rule.id]);
        definitions.save_definition(&def).await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_below_threshold_requires_no_approval() {
        let (engine, pool) = setup().await;
        seed_any_definition(&pool, "GL_DOCUMENT", &["E1"]).await;

        let outcome = engine
            .submit_for_approval(
                "GL_DOCUMENT",
                "GL-1",
                "E0",
                ApprovalContext::new().with("amount", 50.0),
            )
            .await
            .unwrap();
        assert!(!outcome.requires_approval);
        assert!(outcome.instance_id.is_none());
    }

    #[tokio::test]
    async fn test_submit_then_single_approve_completes() {
        let (engine, pool) = setup().await;
        seed_any_definition(&pool, "GL_DOCUMENT", &["E1", "E2", "E3"]).await;

        let outcome = engine
            .submit_for_approval(
                "GL_DOCUMENT",
                "GL-1",
                "E0",
                ApprovalContext::new().with("amount", 5_000.0),
            )
            .await
            .unwrap();
        let instance_id = outcome.instance_id.unwrap();

        let eligible = engine.eligible_approvers(instance_id).await.unwrap();
        assert_eq!(eligible.len(), 3);

        let receipt = engine
            .decide(instance_id, "E2", Decision::Approve, None)
            .await
            .unwrap();
        assert_eq!(receipt.status, InstanceStatus::Approved);

        // Terminal instances expose an empty eligible set.
        assert!(engine.eligible_approvers(instance_id).await.unwrap().is_empty());

        let log = engine.decision_log(instance_id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].approver_id, "E2");
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let (engine, _pool) = setup().await;
        let err = engine.get_instance(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::InstanceNotFound(_)));
    }
}
