//! Workflow definition selection.
//!
//! Given an object type and a submission context, the selector picks the
//! single active definition whose activation conditions match. No match is a
//! normal outcome ("no approval required"); more than one match is broken
//! configuration and fails loud instead of picking arbitrarily.

use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{ApprovalContext, WorkflowDefinition};
use crate::domain::ports::DefinitionRepository;

pub struct DefinitionSelector<D: DefinitionRepository> {
    definitions: Arc<D>,
}

impl<D: DefinitionRepository> DefinitionSelector<D> {
    pub fn new(definitions: Arc<D>) -> Self {
        Self { definitions }
    }

    /// Select the definition governing a submission, if any.
    pub async fn select(
        &self,
        object_type: &str,
        context: &ApprovalContext,
    ) -> EngineResult<Option<WorkflowDefinition>> {
        let candidates = self.definitions.active_for_object_type(object_type).await?;

        let mut matching: Vec<WorkflowDefinition> = candidates
            .into_iter()
            .filter(|d| d.matches(context))
            .collect();

        match matching.len() {
            0 => {
                debug!(object_type, "No active definition matches; approval not required");
                Ok(None)
            }
            1 => Ok(Some(matching.remove(0))),
            _ => {
                let codes = matching.iter().map(|d| d.code.clone()).collect();
                Err(EngineError::AmbiguousDefinitions {
                    object_type: object_type.to_string(),
                    codes,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteDefinitionRepository};
    use crate::domain::models::{ActivationConditions, CompletionRule, FieldScope};
    use uuid::Uuid;

    async fn setup() -> (DefinitionSelector<SqliteDefinitionRepository>, Arc<SqliteDefinitionRepository>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = Arc::new(SqliteDefinitionRepository::new(pool));
        (DefinitionSelector::new(repo.clone()), repo)
    }

    async fn save(
        repo: &SqliteDefinitionRepository,
        code: &str,
        object_type: &str,
        activation: ActivationConditions,
    ) -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new(code, code, object_type, activation);
        def.add_step("Review", "REV", CompletionRule::Any, vec![Uuid::new_v4()]);
        repo.save_definition(&def).await.unwrap();
        def
    }

    #[tokio::test]
    async fn test_no_match_means_no_approval_required() {
        let (selector, repo) = setup().await;
        save(
            &repo,
            "GL-HIGH",
            "GL_DOCUMENT",
            ActivationConditions::always().with_amount(Some(10_000.0), None),
        )
        .await;

        let ctx = ApprovalContext::new().with("amount", 500.0);
        assert!(selector.select("GL_DOCUMENT", &ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_match_is_returned() {
        let (selector, repo) = setup().await;
        save(
            &repo,
            "GL-HIGH",
            "GL_DOCUMENT",
            ActivationConditions::always().with_amount(Some(10_000.0), None),
        )
        .await;
        save(
            &repo,
            "GL-LOW",
            "GL_DOCUMENT",
            ActivationConditions::always().with_amount(Some(1_000.0), Some(9_999.99)),
        )
        .await;

        let ctx = ApprovalContext::new().with("amount", 50_000.0);
        let selected = selector.select("GL_DOCUMENT", &ctx).await.unwrap().unwrap();
        assert_eq!(selected.code, "GL-HIGH");
    }

    #[tokio::test]
    async fn test_overlapping_definitions_fail_loud() {
        let (selector, repo) = setup().await;
        save(&repo, "A", "GL_DOCUMENT", ActivationConditions::always()).await;
        save(&repo, "B", "GL_DOCUMENT", ActivationConditions::always()).await;

        let err = selector
            .select("GL_DOCUMENT", &ApprovalContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AmbiguousDefinitions { .. }));
    }

    #[tokio::test]
    async fn test_scoped_field_narrows_selection() {
        let (selector, repo) = setup().await;
        save(
            &repo,
            "MR-CIVIL",
            "MATERIAL_REQUEST",
            ActivationConditions::always()
                .with_field("department_code", FieldScope::specific(["CIVIL"])),
        )
        .await;

        let civil = ApprovalContext::new().with("department_code", "CIVIL");
        let mep = ApprovalContext::new().with("department_code", "MEP");

        assert!(selector.select("MATERIAL_REQUEST", &civil).await.unwrap().is_some());
        assert!(selector.select("MATERIAL_REQUEST", &mep).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_definitions_are_invisible() {
        let (selector, repo) = setup().await;
        let def = save(&repo, "A", "GL_DOCUMENT", ActivationConditions::always()).await;
        repo.set_active(def.id, false).await.unwrap();

        assert!(selector
            .select("GL_DOCUMENT", &ApprovalContext::new())
            .await
            .unwrap()
            .is_none());
    }
}
