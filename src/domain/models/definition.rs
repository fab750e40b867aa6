//! Workflow definition domain models.
//!
//! A `WorkflowDefinition` is an immutable, versioned template describing the
//! ordered approval steps for a class of business objects, plus the
//! activation conditions deciding when the template applies. Definitions
//! referenced by live instances are never edited in place; administrators
//! deactivate the old definition and register a new one under a new code.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::ApprovalContext;
use super::scope::FieldScope;

// ============================================================================
// Completion rules
// ============================================================================

/// Predicate deciding when a step's recorded decisions are sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionRule {
    /// Every approver in the step's resolved pool must approve.
    All,
    /// A single approval completes the step.
    Any,
    /// At least `min_approvals` distinct approvals complete the step.
    MinN { min_approvals: u32 },
}

impl CompletionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::MinN { .. } => "MIN_N",
        }
    }

    /// Reassemble a rule from its persisted `(rule, min_approvals)` columns.
    ///
    /// `MIN_N` without a minimum is the invalid state the storage layer can
    /// hold but the domain cannot; it surfaces here as a configuration error.
    pub fn from_parts(rule: &str, min_approvals: Option<u32>) -> Result<Self, String> {
        match rule {
            "ALL" => Ok(Self::All),
            "ANY" => Ok(Self::Any),
            "MIN_N" => match min_approvals {
                Some(n) if n >= 1 => Ok(Self::MinN { min_approvals: n }),
                Some(_) => Err("MIN_N requires min_approvals >= 1".to_string()),
                None => Err("MIN_N requires min_approvals".to_string()),
            },
            other => Err(format!("Unknown completion rule: {other}")),
        }
    }

    /// The `min_approvals` column value for persistence.
    pub fn min_approvals(&self) -> Option<u32> {
        match self {
            Self::MinN { min_approvals } => Some(*min_approvals),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompletionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinN { min_approvals } => write!(f, "MIN_N({min_approvals})"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

// ============================================================================
// Activation conditions
// ============================================================================

/// Inclusive monetary range used by amount-threshold activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl AmountRange {
    pub fn contains(&self, amount: f64) -> bool {
        self.min.is_none_or(|min| amount >= min) && self.max.is_none_or(|max| amount <= max)
    }
}

/// Predicate over the submission context deciding whether a definition
/// applies to a given object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationConditions {
    /// Amount threshold. When set, the context must carry a numeric amount
    /// inside the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountRange>,

    /// Scoped context fields (department, plant, document type, ...). A
    /// `Global` scope always matches; a `Specific` scope requires the
    /// context value to be present and a member of the set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldScope>,
}

impl ActivationConditions {
    /// Unconditional activation (matches every context).
    pub fn always() -> Self {
        Self::default()
    }

    pub fn with_amount(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.amount = Some(AmountRange { min, max });
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, scope: FieldScope) -> Self {
        self.fields.insert(field.into(), scope);
        self
    }

    /// Evaluate this predicate against a submission context.
    pub fn matches(&self, context: &ApprovalContext) -> bool {
        if let Some(range) = &self.amount {
            match context.amount() {
                Some(amount) if range.contains(amount) => {}
                _ => return false,
            }
        }
        self.fields
            .iter()
            .all(|(field, scope)| scope.matches(context.get_str(field)))
    }
}

// ============================================================================
// Steps and definitions
// ============================================================================

/// One stage of a workflow definition.
///
/// The eligible-approver pool for a step is the union of the resolutions of
/// all bound agent rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// 1-based position, strictly increasing without gaps.
    pub step_sequence: u32,
    pub name: String,
    pub code: String,
    pub completion_rule: CompletionRule,
    /// Agent rules bound to this step.
    pub agent_rule_ids: Vec<Uuid>,
}

/// A named, versioned approval template for one object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    /// Stable administrative identifier (unique across definitions).
    pub code: String,
    pub name: String,
    pub object_type: String,
    pub activation: ActivationConditions,
    pub is_active: bool,
    /// Steps ordered by `step_sequence`.
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        object_type: impl Into<String>,
        activation: ActivationConditions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            object_type: object_type.into(),
            activation,
            is_active: true,
            steps: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a step with the next sequence number.
    pub fn add_step(
        &mut self,
        name: impl Into<String>,
        code: impl Into<String>,
        completion_rule: CompletionRule,
        agent_rule_ids: Vec<Uuid>,
    ) {
        let step = WorkflowStep {
            id: Uuid::new_v4(),
            workflow_id: self.id,
            step_sequence: self.steps.len() as u32 + 1,
            name: name.into(),
            code: code.into(),
            completion_rule,
            agent_rule_ids,
        };
        self.steps.push(step);
    }

    /// Look up a step by its sequence number.
    pub fn step(&self, sequence: u32) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_sequence == sequence)
    }

    pub fn first_sequence(&self) -> Option<u32> {
        self.steps.iter().map(|s| s.step_sequence).min()
    }

    pub fn last_sequence(&self) -> Option<u32> {
        self.steps.iter().map(|s| s.step_sequence).max()
    }

    /// Whether this definition applies to the given submission context.
    pub fn matches(&self, context: &ApprovalContext) -> bool {
        self.activation.matches(context)
    }

    /// Structural validation, applied before any instance is created from
    /// this definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("Definition has no steps".to_string());
        }

        let mut sequences: Vec<u32> = self.steps.iter().map(|s| s.step_sequence).collect();
        sequences.sort_unstable();
        for (i, seq) in sequences.iter().enumerate() {
            let expected = i as u32 + 1;
            if *seq != expected {
                return Err(format!(
                    "Step sequences must be 1-based and contiguous: expected {expected}, found {seq}"
                ));
            }
        }

        for step in &self.steps {
            if step.agent_rule_ids.is_empty() {
                return Err(format!(
                    "Step {} ('{}') references no agent rules",
                    step.step_sequence, step.code
                ));
            }
        }

        Ok(())
    }
}
