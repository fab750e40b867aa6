//! Domain errors for the quorum approval engine.
//!
//! Every fallible engine operation returns one of these as a typed rejection;
//! nothing crosses the module boundary as an opaque panic or a stringly error.

use thiserror::Error;
use uuid::Uuid;

/// Engine-level errors, grouped by the taxonomy the consuming modules care
/// about: configuration errors (an administrator must fix the setup),
/// conflict errors (the request lost a race or repeats a prior action), and
/// infrastructure failures.
#[derive(Debug, Error)]
pub enum EngineError {
    // -- Configuration errors --
    #[error("Multiple active workflow definitions match object type '{object_type}': {codes:?}")]
    AmbiguousDefinitions {
        object_type: String,
        codes: Vec<String>,
    },

    #[error("Invalid workflow definition '{code}': {reason}")]
    InvalidDefinition { code: String, reason: String },

    #[error("Invalid agent rule '{rule_name}': {reason}")]
    InvalidAgentRule { rule_name: String, reason: String },

    // -- Not found --
    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(Uuid),

    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(Uuid),

    // -- Conflict errors --
    #[error("Object {object_type}/{object_id} already has a live approval instance")]
    DuplicateSubmission {
        object_type: String,
        object_id: String,
    },

    #[error("Approver '{approver_id}' already decided step {step_sequence} of instance {instance_id}")]
    DuplicateDecision {
        instance_id: Uuid,
        step_sequence: u32,
        approver_id: String,
    },

    #[error("Approver '{approver_id}' is not eligible for the current step of instance {instance_id}")]
    NotEligible {
        instance_id: Uuid,
        approver_id: String,
    },

    #[error("Instance {instance_id} is already {status}; no further actions are accepted")]
    InstanceClosed { instance_id: Uuid, status: String },

    #[error("Concurrency conflict: instance {0} was modified by a concurrent operation")]
    ConcurrencyConflict(Uuid),

    // -- Infrastructure --
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Whether this error is a conflict rejection (the request was valid in
    /// form but lost to another action on the same instance or object).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSubmission { .. }
                | Self::DuplicateDecision { .. }
                | Self::NotEligible { .. }
                | Self::InstanceClosed { .. }
                | Self::ConcurrencyConflict(_)
        )
    }

    /// Whether this error indicates broken configuration that an
    /// administrator must resolve.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousDefinitions { .. }
                | Self::InvalidDefinition { .. }
                | Self::InvalidAgentRule { .. }
        )
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
