//! Repository port for workflow definitions and the agent rule catalog.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{AgentRule, WorkflowDefinition};

/// Persistence port for the configuration side of the engine: definitions,
/// their steps, agent rules, and step-rule bindings.
///
/// Definitions are persisted whole (steps and bindings included) and loaded
/// whole; steps are immutable once any instance references the definition,
/// so there is no per-step mutation surface.
#[async_trait]
pub trait DefinitionRepository: Send + Sync {
    /// Persist a definition together with its steps and bindings.
    async fn save_definition(&self, definition: &WorkflowDefinition) -> EngineResult<()>;

    async fn get_definition(&self, id: Uuid) -> EngineResult<Option<WorkflowDefinition>>;

    async fn get_definition_by_code(&self, code: &str) -> EngineResult<Option<WorkflowDefinition>>;

    /// List definitions, optionally restricted to one object type.
    async fn list_definitions(
        &self,
        object_type: Option<&str>,
    ) -> EngineResult<Vec<WorkflowDefinition>>;

    /// Active definitions for an object type, steps and bindings loaded.
    async fn active_for_object_type(
        &self,
        object_type: &str,
    ) -> EngineResult<Vec<WorkflowDefinition>>;

    /// Activate or deactivate a definition without touching its content.
    async fn set_active(&self, id: Uuid, is_active: bool) -> EngineResult<()>;

    // -- Agent rule catalog --

    async fn save_agent_rule(&self, rule: &AgentRule) -> EngineResult<()>;

    async fn get_agent_rule(&self, id: Uuid) -> EngineResult<Option<AgentRule>>;

    async fn get_agent_rule_by_name(&self, rule_name: &str) -> EngineResult<Option<AgentRule>>;

    async fn list_agent_rules(&self) -> EngineResult<Vec<AgentRule>>;
}
