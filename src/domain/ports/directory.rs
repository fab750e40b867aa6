//! Read-only port over the organizational directory.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::models::{ApproverId, DomainApprover, OrgMember, RoleAssignment};

/// Directory reads used by agent-rule resolution. All methods are pure,
/// non-blocking reads; resolution never takes locks.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    async fn get_member(&self, member_id: &str) -> EngineResult<Option<OrgMember>>;

    /// Walk the reporting chain upwards from a member, returning up to
    /// `levels` active managers starting with the direct manager. Inactive
    /// members terminate the walk.
    async fn reporting_chain(
        &self,
        member_id: &str,
        levels: u32,
    ) -> EngineResult<Vec<ApproverId>>;

    /// Active assignments for a role, across all organizational units.
    async fn role_members(&self, role_code: &str) -> EngineResult<Vec<RoleAssignment>>;

    /// Active approvers registered for a functional domain.
    async fn domain_approvers(&self, domain_code: &str) -> EngineResult<Vec<DomainApprover>>;
}
