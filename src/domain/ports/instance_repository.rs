//! Repository port for workflow instances and the decision log.

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{
    ApproverId, InstanceStatus, StepDecision, StepTransition, WorkflowInstance,
};

/// Filters for instance listings.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub status: Option<InstanceStatus>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub limit: Option<i64>,
}

/// Persistence port for the runtime side of the engine.
///
/// The two `apply_*` methods are the only writes to a live instance, and
/// each is one atomic, serializable unit of work: the implementation must
/// commit the decision row (when present), the instance snapshot update, and
/// the next step's pool snapshot together or not at all. The instance update
/// is guarded by the caller-observed `version`; a guard miss maps to
/// `EngineError::ConcurrencyConflict` so the caller can re-read and retry.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Persist a new instance plus the pool snapshot for its first step.
    ///
    /// Violating the one-live-instance-per-object invariant maps to
    /// `EngineError::DuplicateSubmission`.
    async fn create(
        &self,
        instance: &WorkflowInstance,
        first_step_pool: &BTreeSet<ApproverId>,
    ) -> EngineResult<()>;

    async fn get(&self, id: Uuid) -> EngineResult<Option<WorkflowInstance>>;

    /// The live (non-terminal) instance for a business object, if any.
    async fn live_for_object(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> EngineResult<Option<WorkflowInstance>>;

    async fn list(&self, filter: InstanceFilter) -> EngineResult<Vec<WorkflowInstance>>;

    /// Full decision log for an instance, oldest first.
    async fn decisions(&self, instance_id: Uuid) -> EngineResult<Vec<StepDecision>>;

    /// Decision log restricted to one step.
    async fn decisions_for_step(
        &self,
        instance_id: Uuid,
        step_sequence: u32,
    ) -> EngineResult<Vec<StepDecision>>;

    /// The approver pool snapshotted when the instance entered a step.
    async fn pool_for_step(
        &self,
        instance_id: Uuid,
        step_sequence: u32,
    ) -> EngineResult<BTreeSet<ApproverId>>;

    /// In-progress instances whose current step pool contains the approver
    /// and lacks their decision (the approver's worklist).
    async fn pending_for_approver(
        &self,
        approver_id: &str,
    ) -> EngineResult<Vec<WorkflowInstance>>;

    /// Atomically record a decision and apply the resulting transition.
    ///
    /// A duplicate `(instance, step, approver)` decision maps to
    /// `EngineError::DuplicateDecision`; a version-guard miss to
    /// `EngineError::ConcurrencyConflict`. Neither leaves partial state.
    async fn apply_decision(
        &self,
        instance: &WorkflowInstance,
        decision: &StepDecision,
        transition: &StepTransition,
    ) -> EngineResult<()>;

    /// Atomically apply a transition without a decision (cancellation).
    async fn apply_transition(
        &self,
        instance: &WorkflowInstance,
        transition: &StepTransition,
    ) -> EngineResult<()>;
}
