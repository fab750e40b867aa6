//! Workflow instance lifecycle management.
//!
//! The instance manager is the only writer of instance state. Creation,
//! decisions, and cancellation all funnel through here, and every mutation
//! is one atomic unit of work against the instance repository: the decision
//! row, the completion-rule evaluation result, and any step advance commit
//! together or not at all.
//!
//! Concurrency follows optimistic versioning. Each attempt reads the
//! instance snapshot, computes the transition from the decision log, and
//! submits it guarded by the observed version. A guard miss means another
//! decision (or a cancellation) serialized first; the attempt is re-run
//! against the fresh state, so step advances execute exactly once no matter
//! how many approvers race.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    evaluate_step, AgentRule, ApprovalContext, Decision, InstanceStatus, StepDecision,
    StepOutcome, StepTransition, WorkflowDefinition, WorkflowInstance, WorkflowStep,
};
use crate::domain::ports::{DefinitionRepository, InstanceRepository, OrgDirectory};
use crate::services::agent_resolver::AgentResolver;

/// Bounded retries for version-guard misses. Two racing approvers need one
/// retry; anything that keeps conflicting past this is surfaced to the
/// caller as the conflict it is.
const MAX_ATTEMPTS: u32 = 3;

/// What the caller gets back from an accepted decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReceipt {
    pub instance_id: Uuid,
    pub status: InstanceStatus,
    pub current_step_sequence: u32,
}

pub struct InstanceManager<D, I, G>
where
    D: DefinitionRepository,
    I: InstanceRepository,
    G: OrgDirectory,
{
    definitions: Arc<D>,
    instances: Arc<I>,
    resolver: AgentResolver<G>,
}

impl<D, I, G> InstanceManager<D, I, G>
where
    D: DefinitionRepository,
    I: InstanceRepository,
    G: OrgDirectory,
{
    pub fn new(definitions: Arc<D>, instances: Arc<I>, directory: Arc<G>) -> Self {
        Self {
            definitions,
            instances,
            resolver: AgentResolver::new(directory),
        }
    }

    /// Create an instance for a selected definition, positioned at step 1
    /// with the first step's approver pool snapshotted.
    pub async fn create_instance(
        &self,
        definition: &WorkflowDefinition,
        object_id: &str,
        requester_id: &str,
        context: ApprovalContext,
    ) -> EngineResult<WorkflowInstance> {
        definition
            .validate()
            .map_err(|reason| EngineError::InvalidDefinition {
                code: definition.code.clone(),
                reason,
            })?;

        // Fast-path check; the partial unique index is the real guard.
        if self
            .instances
            .live_for_object(&definition.object_type, object_id)
            .await?
            .is_some()
        {
            return Err(EngineError::DuplicateSubmission {
                object_type: definition.object_type.clone(),
                object_id: object_id.to_string(),
            });
        }

        let first_sequence = definition.first_sequence().unwrap_or(1);
        let first_step = definition.step(first_sequence).ok_or_else(|| {
            EngineError::InvalidDefinition {
                code: definition.code.clone(),
                reason: "Definition has no first step".to_string(),
            }
        })?;

        let instance = WorkflowInstance::new(definition, object_id, requester_id, context);
        let pool = self.resolve_step_pool(first_step, &instance).await?;

        self.instances.create(&instance, &pool).await?;

        info!(
            instance_id = %instance.id,
            definition = %definition.code,
            object_type = %instance.object_type,
            object_id = %instance.object_id,
            pool_size = pool.len(),
            "Workflow instance created"
        );

        Ok(instance)
    }

    /// Record an approver's decision and advance the state machine.
    pub async fn decide(
        &self,
        instance_id: Uuid,
        approver_id: &str,
        decision: Decision,
        comment: Option<String>,
    ) -> EngineResult<DecisionReceipt> {
        for attempt in 0..MAX_ATTEMPTS {
            let instance = self
                .instances
                .get(instance_id)
                .await?
                .ok_or(EngineError::InstanceNotFound(instance_id))?;

            if instance.is_terminal() {
                return Err(EngineError::InstanceClosed {
                    instance_id,
                    status: instance.status.to_string(),
                });
            }

            let step_sequence = instance.current_step_sequence;
            let pool = self.instances.pool_for_step(instance_id, step_sequence).await?;
            if !pool.contains(approver_id) {
                return Err(EngineError::NotEligible {
                    instance_id,
                    approver_id: approver_id.to_string(),
                });
            }

            let mut decisions = self
                .instances
                .decisions_for_step(instance_id, step_sequence)
                .await?;
            if decisions.iter().any(|d| d.approver_id == approver_id) {
                return Err(EngineError::DuplicateDecision {
                    instance_id,
                    step_sequence,
                    approver_id: approver_id.to_string(),
                });
            }

            let definition = self
                .definitions
                .get_definition(instance.workflow_id)
                .await?
                .ok_or(EngineError::DefinitionNotFound(instance.workflow_id))?;
            let step = definition.step(step_sequence).ok_or_else(|| {
                EngineError::InvalidDefinition {
                    code: definition.code.clone(),
                    reason: format!("Instance points at unknown step {step_sequence}"),
                }
            })?;

            let record =
                StepDecision::new(instance_id, step_sequence, approver_id, decision, comment.clone());
            decisions.push(record.clone());

            let transition = self
                .compute_transition(&definition, step, &instance, &pool, &decisions)
                .await?;

            match self.instances.apply_decision(&instance, &record, &transition).await {
                Ok(()) => {
                    let receipt = DecisionReceipt {
                        instance_id,
                        status: transition.new_status().unwrap_or(instance.status),
                        current_step_sequence: transition
                            .next_sequence()
                            .unwrap_or(step_sequence),
                    };
                    info!(
                        instance_id = %instance_id,
                        approver_id,
                        decision = decision.as_str(),
                        status = %receipt.status,
                        step = receipt.current_step_sequence,
                        "Decision recorded"
                    );
                    return Ok(receipt);
                }
                Err(EngineError::ConcurrencyConflict(_)) => {
                    debug!(
                        instance_id = %instance_id,
                        attempt,
                        "Version guard missed; re-evaluating against fresh state"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(EngineError::ConcurrencyConflict(instance_id))
    }

    /// Cancel a live instance on behalf of the originating module.
    pub async fn cancel(&self, instance_id: Uuid, requested_by: &str) -> EngineResult<InstanceStatus> {
        for attempt in 0..MAX_ATTEMPTS {
            let instance = self
                .instances
                .get(instance_id)
                .await?
                .ok_or(EngineError::InstanceNotFound(instance_id))?;

            if instance.is_terminal() {
                return Err(EngineError::InstanceClosed {
                    instance_id,
                    status: instance.status.to_string(),
                });
            }

            match self
                .instances
                .apply_transition(&instance, &StepTransition::Cancelled)
                .await
            {
                Ok(()) => {
                    info!(instance_id = %instance_id, requested_by, "Instance cancelled");
                    return Ok(InstanceStatus::Cancelled);
                }
                Err(EngineError::ConcurrencyConflict(_)) => {
                    debug!(instance_id = %instance_id, attempt, "Cancel lost a race; re-reading");
                }
                Err(e) => return Err(e),
            }
        }

        Err(EngineError::ConcurrencyConflict(instance_id))
    }

    /// Evaluate the current step against its decision log and decide where
    /// the instance goes next. Pure except for resolving the next pool.
    async fn compute_transition(
        &self,
        definition: &WorkflowDefinition,
        step: &WorkflowStep,
        instance: &WorkflowInstance,
        pool: &std::collections::BTreeSet<String>,
        decisions: &[StepDecision],
    ) -> EngineResult<StepTransition> {
        match evaluate_step(step.completion_rule, pool, decisions) {
            StepOutcome::Rejected => Ok(StepTransition::Rejected),
            StepOutcome::Pending => Ok(StepTransition::Stay),
            StepOutcome::Satisfied => {
                let next_sequence = step.step_sequence + 1;
                match definition.step(next_sequence) {
                    None => Ok(StepTransition::Approved),
                    Some(next_step) => {
                        let next_pool = self.resolve_step_pool(next_step, instance).await?;
                        Ok(StepTransition::Advance {
                            next_step_sequence: next_sequence,
                            pool: next_pool,
                        })
                    }
                }
            }
        }
    }

    async fn resolve_step_pool(
        &self,
        step: &WorkflowStep,
        instance: &WorkflowInstance,
    ) -> EngineResult<std::collections::BTreeSet<String>> {
        let rules = self.load_step_rules(step).await?;
        let pool = self
            .resolver
            .resolve_pool(&rules, &instance.requester_id, &instance.context)
            .await?;

        if pool.is_empty() {
            warn!(
                instance_id = %instance.id,
                step = step.step_sequence,
                step_code = %step.code,
                "Step entered with an empty approver pool; manual intervention required"
            );
        }
        Ok(pool)
    }

    async fn load_step_rules(&self, step: &WorkflowStep) -> EngineResult<Vec<AgentRule>> {
        let mut rules = Vec::with_capacity(step.agent_rule_ids.len());
        for rule_id in &step.agent_rule_ids {
            let rule = self.definitions.get_agent_rule(*rule_id).await?.ok_or_else(|| {
                EngineError::InvalidDefinition {
                    code: step.code.clone(),
                    reason: format!("Step references unknown agent rule {rule_id}"),
                }
            })?;
            rules.push(rule);
        }
        Ok(rules)
    }
}
