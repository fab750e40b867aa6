//! Pure domain models for the approval engine.

pub mod agent_rule;
pub mod config;
pub mod context;
pub mod definition;
pub mod directory;
pub mod instance;
pub mod scope;

pub use agent_rule::{AgentRule, AgentRuleKind, ApproverId};
pub use config::{Config, DatabaseConfig, LoggingConfig};
pub use context::{ApprovalContext, AMOUNT_FIELD};
pub use definition::{
    ActivationConditions, AmountRange, CompletionRule, WorkflowDefinition, WorkflowStep,
};
pub use directory::{DomainApprover, OrgMember, RoleAssignment};
pub use instance::{
    evaluate_step, Decision, InstanceStatus, StepDecision, StepOutcome, StepTransition,
    WorkflowInstance,
};
pub use scope::FieldScope;
