//! Agent rule resolution.
//!
//! Resolves agent rules to concrete approver identity sets against the
//! organizational directory. Resolution is a pure read: same directory
//! state, same requester, same context, same result. A step's pool is the
//! union of its bound rules' resolutions; an unresolvable rule contributes
//! an empty set and the step's completion rule decides what that means.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use crate::domain::errors::EngineResult;
use crate::domain::models::{AgentRule, AgentRuleKind, ApprovalContext, ApproverId};
use crate::domain::ports::OrgDirectory;

pub struct AgentResolver<G: OrgDirectory> {
    directory: Arc<G>,
}

impl<G: OrgDirectory> AgentResolver<G> {
    pub fn new(directory: Arc<G>) -> Self {
        Self { directory }
    }

    /// Resolve a single rule to its candidate approver set.
    pub async fn resolve_rule(
        &self,
        rule: &AgentRule,
        requester_id: &str,
        context: &ApprovalContext,
    ) -> EngineResult<BTreeSet<ApproverId>> {
        let resolved = match &rule.kind {
            AgentRuleKind::Hierarchy { levels } => {
                self.resolve_hierarchy(requester_id, *levels).await?
            }
            AgentRuleKind::Role { role_code, org_unit_field } => {
                self.resolve_role(role_code, org_unit_field.as_deref(), context)
                    .await?
            }
            AgentRuleKind::FunctionalDomain { domain_code } => {
                self.resolve_functional_domain(domain_code, context).await?
            }
            AgentRuleKind::ExplicitList { approvers } => approvers.clone(),
        };

        if resolved.is_empty() {
            warn!(
                rule_name = %rule.rule_name,
                rule_type = rule.kind.rule_type(),
                requester_id,
                "Agent rule resolved to an empty approver set"
            );
        }

        Ok(resolved)
    }

    /// Resolve a step's full pool: the union over all bound rules.
    pub async fn resolve_pool(
        &self,
        rules: &[AgentRule],
        requester_id: &str,
        context: &ApprovalContext,
    ) -> EngineResult<BTreeSet<ApproverId>> {
        let mut pool = BTreeSet::new();
        for rule in rules {
            pool.extend(self.resolve_rule(rule, requester_id, context).await?);
        }
        Ok(pool)
    }

    /// Walk the requester's reporting chain. The rule asks for exactly
    /// `levels` managers; a shorter chain is unresolvable.
    async fn resolve_hierarchy(
        &self,
        requester_id: &str,
        levels: u32,
    ) -> EngineResult<BTreeSet<ApproverId>> {
        let chain = self.directory.reporting_chain(requester_id, levels).await?;
        if chain.len() < levels as usize {
            return Ok(BTreeSet::new());
        }
        Ok(chain.into_iter().collect())
    }

    /// All active holders of a role, optionally narrowed to the
    /// organizational unit named by a context field. Unscoped assignments
    /// apply in every unit.
    async fn resolve_role(
        &self,
        role_code: &str,
        org_unit_field: Option<&str>,
        context: &ApprovalContext,
    ) -> EngineResult<BTreeSet<ApproverId>> {
        let assignments = self.directory.role_members(role_code).await?;

        let unit = org_unit_field.and_then(|field| context.get_str(field));
        let members = assignments
            .into_iter()
            .filter(|a| match (&a.org_unit, org_unit_field) {
                (None, _) => true,
                (Some(_), None) => true,
                (Some(assigned), Some(_)) => unit == Some(assigned.as_str()),
            })
            .map(|a| a.member_id)
            .collect();

        Ok(members)
    }

    /// Tiered resolution against the domain's approval limits: the lowest
    /// tier whose limit covers the context amount wins, so an amount above
    /// the base tier escalates to the next one. An amount above every tier
    /// resolves empty and is surfaced as a resolution gap.
    async fn resolve_functional_domain(
        &self,
        domain_code: &str,
        context: &ApprovalContext,
    ) -> EngineResult<BTreeSet<ApproverId>> {
        let approvers = self.directory.domain_approvers(domain_code).await?;
        let amount = context.amount().unwrap_or(0.0);

        let mut limits: Vec<f64> = approvers.iter().map(|a| a.approval_limit).collect();
        limits.sort_by(f64::total_cmp);
        limits.dedup();

        let Some(tier) = limits.into_iter().find(|limit| *limit >= amount) else {
            return Ok(BTreeSet::new());
        };

        Ok(approvers
            .into_iter()
            .filter(|a| a.approval_limit.total_cmp(&tier).is_eq())
            .map(|a| a.member_id)
            .collect())
    }
}
