//! Workflow instance domain models.
//!
//! An instance is the live approval process bound to one business object.
//! Progression is an explicit state machine over an append-only decision
//! log: decisions are only ever inserted, and the `(current_step_sequence,
//! status)` snapshot is recomputed from the log inside one atomic unit of
//! work per accepted decision.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent_rule::ApproverId;
use super::context::ApprovalContext;
use super::definition::{CompletionRule, WorkflowDefinition};

// ============================================================================
// Status & decisions
// ============================================================================

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Waiting on decisions for the current step.
    InProgress,
    /// Every step completed.
    Approved,
    /// Some approver rejected; rejection is terminal for the whole instance.
    Rejected,
    /// The originating object was withdrawn.
    Cancelled,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An individual approver's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "APPROVE" => Some(Self::Approve),
            "REJECT" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// One row of the append-only decision log. Unique per
/// `(instance_id, step_sequence, approver_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDecision {
    pub instance_id: Uuid,
    pub step_sequence: u32,
    pub approver_id: ApproverId,
    pub decision: Decision,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl StepDecision {
    pub fn new(
        instance_id: Uuid,
        step_sequence: u32,
        approver_id: impl Into<ApproverId>,
        decision: Decision,
        comment: Option<String>,
    ) -> Self {
        Self {
            instance_id,
            step_sequence,
            approver_id: approver_id.into(),
            decision,
            comment,
            decided_at: Utc::now(),
        }
    }
}

// ============================================================================
// Instance
// ============================================================================

/// Live (or historical) approval process for one business object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub object_type: String,
    /// Unique per live instance; enforced by the store.
    pub object_id: String,
    pub requester_id: ApproverId,
    /// Context snapshot captured at creation; never mutated afterwards.
    pub context: ApprovalContext,
    pub current_step_sequence: u32,
    pub status: InstanceStatus,
    /// Optimistic-concurrency version; every accepted mutation increments it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Create a fresh instance positioned at the definition's first step.
    pub fn new(
        definition: &WorkflowDefinition,
        object_id: impl Into<String>,
        requester_id: impl Into<ApproverId>,
        context: ApprovalContext,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id: definition.id,
            object_type: definition.object_type.clone(),
            object_id: object_id.into(),
            requester_id: requester_id.into(),
            context,
            current_step_sequence: definition.first_sequence().unwrap_or(1),
            status: InstanceStatus::InProgress,
            version: 1,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ============================================================================
// Step evaluation (pure)
// ============================================================================

/// Outcome of evaluating a step's completion rule against its decision log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The rule is not yet satisfied; the instance stays on this step.
    Pending,
    /// The rule is satisfied; the instance advances (or completes).
    Satisfied,
    /// A rejection was recorded; the instance terminates.
    Rejected,
}

/// Evaluate a completion rule against the snapshotted pool and the decisions
/// recorded for one `(instance, step)`.
///
/// A single REJECT short-circuits regardless of the rule. An empty pool
/// never satisfies ALL or MIN_N (and ANY has nobody left to approve), which
/// leaves the instance in progress for operator intervention.
pub fn evaluate_step(
    rule: CompletionRule,
    pool: &BTreeSet<ApproverId>,
    decisions: &[StepDecision],
) -> StepOutcome {
    if decisions.iter().any(|d| d.decision == Decision::Reject) {
        return StepOutcome::Rejected;
    }

    let approvals: BTreeSet<&ApproverId> = decisions
        .iter()
        .filter(|d| d.decision == Decision::Approve)
        .map(|d| &d.approver_id)
        .collect();

    let satisfied = match rule {
        CompletionRule::All => {
            !pool.is_empty() && pool.iter().all(|member| approvals.contains(member))
        }
        CompletionRule::Any => !approvals.is_empty(),
        CompletionRule::MinN { min_approvals } => approvals.len() >= min_approvals as usize,
    };

    if satisfied {
        StepOutcome::Satisfied
    } else {
        StepOutcome::Pending
    }
}

/// Transition applied to an instance as the result of one atomic unit of
/// work. `Advance` carries the next step's resolved pool so the snapshot is
/// persisted together with the step change.
#[derive(Debug, Clone, PartialEq)]
pub enum StepTransition {
    /// Decision accepted, step not yet satisfied.
    Stay,
    /// Current step satisfied; enter the next one.
    Advance {
        next_step_sequence: u32,
        pool: BTreeSet<ApproverId>,
    },
    /// Final step satisfied.
    Approved,
    /// Rejection short-circuit.
    Rejected,
    /// External withdrawal.
    Cancelled,
}

impl StepTransition {
    /// The status the instance ends up in, when the transition changes it.
    pub fn new_status(&self) -> Option<InstanceStatus> {
        match self {
            Self::Stay | Self::Advance { .. } => None,
            Self::Approved => Some(InstanceStatus::Approved),
            Self::Rejected => Some(InstanceStatus::Rejected),
            Self::Cancelled => Some(InstanceStatus::Cancelled),
        }
    }

    /// The step the instance moves to, for `Advance`.
    pub fn next_sequence(&self) -> Option<u32> {
        match self {
            Self::Advance { next_step_sequence, .. } => Some(*next_step_sequence),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.new_status().is_some_and(|s| s.is_terminal())
    }
}
