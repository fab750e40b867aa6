//! SQLite implementation of the OrgDirectory port.
//!
//! The engine only reads the directory; the inherent `upsert_*` methods
//! exist for the admin CLI and test seeding.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::EngineResult;
use crate::domain::models::{ApproverId, DomainApprover, OrgMember, RoleAssignment};
use crate::domain::ports::OrgDirectory;

#[derive(Clone)]
pub struct SqliteOrgDirectory {
    pool: SqlitePool,
}

impl SqliteOrgDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_member(&self, member: &OrgMember) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO org_members (member_id, name, manager_id, department_code, plant_code, is_active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(member_id) DO UPDATE SET
                name = excluded.name,
                manager_id = excluded.manager_id,
                department_code = excluded.department_code,
                plant_code = excluded.plant_code,
                is_active = excluded.is_active",
        )
        .bind(&member.member_id)
        .bind(&member.name)
        .bind(&member.manager_id)
        .bind(&member.department_code)
        .bind(&member.plant_code)
        .bind(i32::from(member.is_active))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_role_assignment(&self, assignment: &RoleAssignment) -> EngineResult<()> {
        // Assignments have no natural single-column key; replace any
        // identical (member, role, unit) row instead of duplicating it.
        sqlx::query(
            "DELETE FROM role_assignments
             WHERE member_id = ? AND role_code = ? AND org_unit IS ?",
        )
        .bind(&assignment.member_id)
        .bind(&assignment.role_code)
        .bind(&assignment.org_unit)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO role_assignments (member_id, role_code, org_unit, is_active)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&assignment.member_id)
        .bind(&assignment.role_code)
        .bind(&assignment.org_unit)
        .bind(i32::from(assignment.is_active))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_domain_approver(&self, approver: &DomainApprover) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO domain_approvers (member_id, domain_code, approval_limit, is_active)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(member_id, domain_code) DO UPDATE SET
                approval_limit = excluded.approval_limit,
                is_active = excluded.is_active",
        )
        .bind(&approver.member_id)
        .bind(&approver.domain_code)
        .bind(approver.approval_limit)
        .bind(i32::from(approver.is_active))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_members(&self) -> EngineResult<Vec<OrgMember>> {
        let rows: Vec<MemberRow> = sqlx::query_as("SELECT * FROM org_members ORDER BY member_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl OrgDirectory for SqliteOrgDirectory {
    async fn get_member(&self, member_id: &str) -> EngineResult<Option<OrgMember>> {
        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT * FROM org_members WHERE member_id = ?",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn reporting_chain(
        &self,
        member_id: &str,
        levels: u32,
    ) -> EngineResult<Vec<ApproverId>> {
        let mut chain = Vec::with_capacity(levels as usize);
        let mut current = member_id.to_string();

        for _ in 0..levels {
            let row: Option<MemberRow> = sqlx::query_as(
                "SELECT * FROM org_members WHERE member_id = ?",
            )
            .bind(&current)
            .fetch_optional(&self.pool)
            .await?;

            let Some(member) = row else { break };
            let Some(manager_id) = member.manager_id else { break };

            let manager: Option<MemberRow> = sqlx::query_as(
                "SELECT * FROM org_members WHERE member_id = ? AND is_active = 1",
            )
            .bind(&manager_id)
            .fetch_optional(&self.pool)
            .await?;

            if manager.is_none() {
                break;
            }
            chain.push(manager_id.clone());
            current = manager_id;
        }

        Ok(chain)
    }

    async fn role_members(&self, role_code: &str) -> EngineResult<Vec<RoleAssignment>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            "SELECT r.* FROM role_assignments r
             INNER JOIN org_members m ON m.member_id = r.member_id
             WHERE r.role_code = ? AND r.is_active = 1 AND m.is_active = 1",
        )
        .bind(role_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn domain_approvers(&self, domain_code: &str) -> EngineResult<Vec<DomainApprover>> {
        let rows: Vec<DomainRow> = sqlx::query_as(
            "SELECT d.* FROM domain_approvers d
             INNER JOIN org_members m ON m.member_id = d.member_id
             WHERE d.domain_code = ? AND d.is_active = 1 AND m.is_active = 1",
        )
        .bind(domain_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Row types for sqlx
// ============================================================================

#[derive(sqlx::FromRow)]
struct MemberRow {
    member_id: String,
    name: String,
    manager_id: Option<String>,
    department_code: Option<String>,
    plant_code: Option<String>,
    is_active: i32,
}

impl From<MemberRow> for OrgMember {
    fn from(row: MemberRow) -> Self {
        OrgMember {
            member_id: row.member_id,
            name: row.name,
            manager_id: row.manager_id,
            department_code: row.department_code,
            plant_code: row.plant_code,
            is_active: row.is_active != 0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    member_id: String,
    role_code: String,
    org_unit: Option<String>,
    is_active: i32,
}

impl From<RoleRow> for RoleAssignment {
    fn from(row: RoleRow) -> Self {
        RoleAssignment {
            member_id: row.member_id,
            role_code: row.role_code,
            org_unit: row.org_unit,
            is_active: row.is_active != 0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DomainRow {
    member_id: String,
    domain_code: String,
    approval_limit: f64,
    is_active: i32,
}

impl From<DomainRow> for DomainApprover {
    fn from(row: DomainRow) -> Self {
        DomainApprover {
            member_id: row.member_id,
            domain_code: row.domain_code,
            approval_limit: row.approval_limit,
            is_active: row.is_active != 0,
        }
    }
}
