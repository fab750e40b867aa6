//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use quorum::adapters::sqlite::{
    create_migrated_test_pool, initialize_database, SqliteDefinitionRepository,
    SqliteInstanceRepository, SqliteOrgDirectory,
};
use quorum::domain::models::{
    ActivationConditions, AgentRule, AgentRuleKind, CompletionRule, DomainApprover, OrgMember,
    WorkflowDefinition,
};
use quorum::domain::ports::DefinitionRepository;
use quorum::services::SqliteApprovalEngine;

pub struct TestHarness {
    pub engine: Arc<SqliteApprovalEngine>,
    pub pool: SqlitePool,
    pub definitions: SqliteDefinitionRepository,
    pub instances: SqliteInstanceRepository,
    pub directory: SqliteOrgDirectory,
    // Kept alive so the database file outlives the test.
    _tmp: Option<TempDir>,
}

impl TestHarness {
    fn from_pool(pool: SqlitePool, tmp: Option<TempDir>) -> Self {
        Self {
            engine: Arc::new(SqliteApprovalEngine::from_pool(pool.clone())),
            definitions: SqliteDefinitionRepository::new(pool.clone()),
            instances: SqliteInstanceRepository::new(pool.clone()),
            directory: SqliteOrgDirectory::new(pool.clone()),
            pool,
            _tmp: tmp,
        }
    }
}

/// In-memory harness for sequential scenarios.
pub async fn harness() -> TestHarness {
    let pool = create_migrated_test_pool().await.unwrap();
    TestHarness::from_pool(pool, None)
}

/// File-backed harness with a multi-connection pool, for tests that need
/// genuinely concurrent transactions.
pub async fn file_harness() -> TestHarness {
    let tmp = TempDir::new().unwrap();
    let url = format!("sqlite:{}", tmp.path().join("quorum.db").display());
    let pool = initialize_database(&url).await.unwrap();
    TestHarness::from_pool(pool, Some(tmp))
}

/// Register an EXPLICIT_LIST agent rule.
pub async fn explicit_rule(h: &TestHarness, name: &str, members: &[&str]) -> AgentRule {
    let rule = AgentRule::new(
        name,
        AgentRuleKind::ExplicitList {
            approvers: members.iter().map(|m| (*m).to_string()).collect(),
        },
    );
    h.definitions.save_agent_rule(&rule).await.unwrap();
    rule
}

/// Register a single-step definition bound to one rule.
pub async fn single_step_definition(
    h: &TestHarness,
    code: &str,
    object_type: &str,
    activation: ActivationConditions,
    completion_rule: CompletionRule,
    rule_id: Uuid,
) -> WorkflowDefinition {
    let mut def = WorkflowDefinition::new(code, code, object_type, activation);
    def.add_step("Review", "REV", completion_rule, vec![rule_id]);
    h.definitions.save_definition(&def).await.unwrap();
    def
}

/// Seed an active directory member.
pub async fn seed_member(h: &TestHarness, member_id: &str, manager_id: Option<&str>) {
    h.directory
        .upsert_member(&OrgMember {
            member_id: member_id.to_string(),
            name: format!("Member {member_id}"),
            manager_id: manager_id.map(String::from),
            department_code: None,
            plant_code: None,
            is_active: true,
        })
        .await
        .unwrap();
}

/// Seed a member registered as a functional-domain approver.
pub async fn seed_domain_approver(h: &TestHarness, member_id: &str, domain: &str, limit: f64) {
    seed_member(h, member_id, None).await;
    h.directory
        .upsert_domain_approver(&DomainApprover {
            member_id: member_id.to_string(),
            domain_code: domain.to_string(),
            approval_limit: limit,
            is_active: true,
        })
        .await
        .unwrap();
}
