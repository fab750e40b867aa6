//! Quorum - Approval Workflow Engine
//!
//! Quorum is a context-driven multi-step approval workflow engine: business
//! modules submit objects (GL documents, purchase requisitions, material
//! requests) with a context snapshot, a matching workflow definition is
//! selected, approver pools are resolved from agent rules, and the instance
//! advances step by step as approvers record decisions.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic, models, and ports
//! - **Service Layer** (`services`): Selection, resolution, and the
//!   concurrency-critical instance state machine
//! - **Adapters** (`adapters`): SQLite implementations of the ports
//! - **Infrastructure** (`infrastructure`): Configuration loading
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use quorum::services::SqliteApprovalEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = quorum::adapters::sqlite::initialize_default_database().await?;
//!     let engine = SqliteApprovalEngine::from_pool(pool);
//!     // engine.submit_for_approval(...)
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{EngineError, EngineResult};
pub use domain::models::{
    ActivationConditions, AgentRule, AgentRuleKind, ApprovalContext, ApproverId, CompletionRule,
    Config, Decision, FieldScope, InstanceStatus, StepDecision, WorkflowDefinition,
    WorkflowInstance, WorkflowStep,
};
pub use domain::ports::{
    DefinitionRepository, InstanceFilter, InstanceRepository, OrgDirectory,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ApprovalEngine, DecisionReceipt, SqliteApprovalEngine, SubmissionOutcome};
