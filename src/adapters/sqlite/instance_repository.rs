//! SQLite implementation of the InstanceRepository.
//!
//! This adapter owns the engine's two atomic units of work. Each runs in a
//! single transaction and guards the instance update with the caller's
//! observed `version`, so concurrent decisions on the same instance
//! serialize: the loser's guard misses, the transaction rolls back whole,
//! and the caller re-reads and retries. Operations on different instances
//! never contend beyond SQLite's write serialization.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    ApprovalContext, ApproverId, Decision, InstanceStatus, StepDecision, StepTransition,
    WorkflowInstance,
};
use crate::domain::ports::{InstanceFilter, InstanceRepository};

use super::{is_unique_violation, parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteInstanceRepository {
    pool: SqlitePool,
}

impl SqliteInstanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Version-guarded instance update inside an open transaction. Returns
    /// `ConcurrencyConflict` when the guard misses.
    async fn guarded_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        instance: &WorkflowInstance,
        transition: &StepTransition,
    ) -> EngineResult<()> {
        let now = Utc::now();
        let new_step = transition
            .next_sequence()
            .unwrap_or(instance.current_step_sequence);
        let new_status = transition.new_status().unwrap_or(instance.status);
        let completed_at = transition.is_terminal().then(|| now.to_rfc3339());

        let result = sqlx::query(
            "UPDATE workflow_instances
             SET current_step_sequence = ?, status = ?, version = version + 1,
                 updated_at = ?, completed_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(i64::from(new_step))
        .bind(new_status.as_str())
        .bind(now.to_rfc3339())
        .bind(completed_at)
        .bind(instance.id.to_string())
        .bind(instance.version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::ConcurrencyConflict(instance.id));
        }
        Ok(())
    }

    async fn insert_pool(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        instance_id: Uuid,
        step_sequence: u32,
        pool: &BTreeSet<ApproverId>,
    ) -> EngineResult<()> {
        for approver_id in pool {
            sqlx::query(
                "INSERT OR IGNORE INTO step_approver_pool (instance_id, step_sequence, approver_id)
                 VALUES (?, ?, ?)",
            )
            .bind(instance_id.to_string())
            .bind(i64::from(step_sequence))
            .bind(approver_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceRepository for SqliteInstanceRepository {
    async fn create(
        &self,
        instance: &WorkflowInstance,
        first_step_pool: &BTreeSet<ApproverId>,
    ) -> EngineResult<()> {
        let context_json = serde_json::to_string(&instance.context)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO workflow_instances
             (id, workflow_id, object_type, object_id, requester_id, context_json,
              current_step_sequence, status, version, created_at, updated_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(instance.id.to_string())
        .bind(instance.workflow_id.to_string())
        .bind(&instance.object_type)
        .bind(&instance.object_id)
        .bind(&instance.requester_id)
        .bind(&context_json)
        .bind(i64::from(instance.current_step_sequence))
        .bind(instance.status.as_str())
        .bind(instance.version)
        .bind(instance.created_at.to_rfc3339())
        .bind(instance.updated_at.to_rfc3339())
        .bind(instance.completed_at.map(|t| t.to_rfc3339()))
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(EngineError::DuplicateSubmission {
                    object_type: instance.object_type.clone(),
                    object_id: instance.object_id.clone(),
                });
            }
            return Err(e.into());
        }

        Self::insert_pool(&mut tx, instance.id, instance.current_step_sequence, first_step_pool)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<WorkflowInstance>> {
        let row: Option<InstanceRow> = sqlx::query_as(
            "SELECT * FROM workflow_instances WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn live_for_object(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> EngineResult<Option<WorkflowInstance>> {
        let row: Option<InstanceRow> = sqlx::query_as(
            "SELECT * FROM workflow_instances
             WHERE object_type = ? AND object_id = ? AND status = 'in_progress'",
        )
        .bind(object_type)
        .bind(object_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: InstanceFilter) -> EngineResult<Vec<WorkflowInstance>> {
        let mut query = String::from("SELECT * FROM workflow_instances WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(object_type) = &filter.object_type {
            query.push_str(" AND object_type = ?");
            bindings.push(object_type.clone());
        }
        if let Some(object_id) = &filter.object_id {
            query.push_str(" AND object_id = ?");
            bindings.push(object_id.clone());
        }

        query.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, InstanceRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<InstanceRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn decisions(&self, instance_id: Uuid) -> EngineResult<Vec<StepDecision>> {
        let rows: Vec<DecisionRow> = sqlx::query_as(
            "SELECT * FROM step_decisions WHERE instance_id = ?
             ORDER BY step_sequence, decided_at",
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn decisions_for_step(
        &self,
        instance_id: Uuid,
        step_sequence: u32,
    ) -> EngineResult<Vec<StepDecision>> {
        let rows: Vec<DecisionRow> = sqlx::query_as(
            "SELECT * FROM step_decisions WHERE instance_id = ? AND step_sequence = ?
             ORDER BY decided_at",
        )
        .bind(instance_id.to_string())
        .bind(i64::from(step_sequence))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn pool_for_step(
        &self,
        instance_id: Uuid,
        step_sequence: u32,
    ) -> EngineResult<BTreeSet<ApproverId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT approver_id FROM step_approver_pool
             WHERE instance_id = ? AND step_sequence = ?",
        )
        .bind(instance_id.to_string())
        .bind(i64::from(step_sequence))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn pending_for_approver(
        &self,
        approver_id: &str,
    ) -> EngineResult<Vec<WorkflowInstance>> {
        let rows: Vec<InstanceRow> = sqlx::query_as(
            "SELECT i.* FROM workflow_instances i
             INNER JOIN step_approver_pool p
                ON p.instance_id = i.id AND p.step_sequence = i.current_step_sequence
             WHERE i.status = 'in_progress'
               AND p.approver_id = ?
               AND NOT EXISTS (
                   SELECT 1 FROM step_decisions d
                   WHERE d.instance_id = i.id
                     AND d.step_sequence = i.current_step_sequence
                     AND d.approver_id = p.approver_id
               )
             ORDER BY i.created_at",
        )
        .bind(approver_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn apply_decision(
        &self,
        instance: &WorkflowInstance,
        decision: &StepDecision,
        transition: &StepTransition,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO step_decisions
             (instance_id, step_sequence, approver_id, decision, comment, decided_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(decision.instance_id.to_string())
        .bind(i64::from(decision.step_sequence))
        .bind(&decision.approver_id)
        .bind(decision.decision.as_str())
        .bind(&decision.comment)
        .bind(decision.decided_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(EngineError::DuplicateDecision {
                    instance_id: decision.instance_id,
                    step_sequence: decision.step_sequence,
                    approver_id: decision.approver_id.clone(),
                });
            }
            return Err(e.into());
        }

        Self::guarded_update(&mut tx, instance, transition).await?;

        if let StepTransition::Advance { next_step_sequence, pool } = transition {
            Self::insert_pool(&mut tx, instance.id, *next_step_sequence, pool).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_transition(
        &self,
        instance: &WorkflowInstance,
        transition: &StepTransition,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::guarded_update(&mut tx, instance, transition).await?;

        if let StepTransition::Advance { next_step_sequence, pool } = transition {
            Self::insert_pool(&mut tx, instance.id, *next_step_sequence, pool).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Row types for sqlx
// ============================================================================

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: String,
    workflow_id: String,
    object_type: String,
    object_id: String,
    requester_id: String,
    context_json: String,
    current_step_sequence: i64,
    status: String,
    version: i64,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TryFrom<InstanceRow> for WorkflowInstance {
    type Error = EngineError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let status = InstanceStatus::from_str(&row.status).ok_or_else(|| {
            EngineError::Serialization(format!("Unknown instance status: {}", row.status))
        })?;
        let context: ApprovalContext = serde_json::from_str(&row.context_json)?;

        Ok(WorkflowInstance {
            id: parse_uuid(&row.id)?,
            workflow_id: parse_uuid(&row.workflow_id)?,
            object_type: row.object_type,
            object_id: row.object_id,
            requester_id: row.requester_id,
            context,
            current_step_sequence: row.current_step_sequence as u32,
            status,
            version: row.version,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    instance_id: String,
    step_sequence: i64,
    approver_id: String,
    decision: String,
    comment: Option<String>,
    decided_at: String,
}

impl TryFrom<DecisionRow> for StepDecision {
    type Error = EngineError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        let decision = Decision::from_str(&row.decision).ok_or_else(|| {
            EngineError::Serialization(format!("Unknown decision: {}", row.decision))
        })?;

        Ok(StepDecision {
            instance_id: parse_uuid(&row.instance_id)?,
            step_sequence: row.step_sequence as u32,
            approver_id: row.approver_id,
            decision,
            comment: row.comment,
            decided_at: parse_datetime(&row.decided_at)?,
        })
    }
}
