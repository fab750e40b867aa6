//! Organizational directory models.
//!
//! The directory is read-only source data for agent-rule resolution: who
//! reports to whom, who holds which role, and who may approve how much in
//! which functional domain. It is maintained outside the engine (HR import,
//! admin CLI) and the engine never writes to it.

use serde::{Deserialize, Serialize};

use super::agent_rule::ApproverId;

/// One person in the organizational hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMember {
    pub member_id: ApproverId,
    pub name: String,
    /// Direct manager; `None` at the top of the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<ApproverId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_code: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A role held by a member, optionally scoped to one organizational unit
/// (plant, department). An unscoped assignment applies everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub member_id: ApproverId,
    pub role_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A member registered to approve within a functional domain up to a
/// monetary limit. Distinct limits form the domain's escalation tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainApprover {
    pub member_id: ApproverId,
    pub domain_code: String,
    pub approval_limit: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}
