//! Execution log and step repository functions.
//!
//! Steps are stored one row per step, keyed by `(log_id, sequence)`, so a
//! step write never rewrites earlier steps.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::decode;
use crate::{
    models::{ExecutionLog, RunStatus, Step},
    DbError,
};

#[derive(FromRow)]
struct ExecutionLogRow {
    id: Uuid,
    tenant_id: Uuid,
    automation_id: Uuid,
    record_id: Uuid,
    triggered_by: String,
    status: String,
    error: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct StepRow {
    sequence: i32,
    node_id: String,
    node_kind: String,
    label: String,
    action_type: Option<String>,
    status: String,
    message: String,
    result: Option<String>,
    error: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// Insert a new execution log row (normally in `running` status).
pub async fn create_execution_log(pool: &PgPool, log: &ExecutionLog) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO execution_logs
            (id, tenant_id, automation_id, record_id, triggered_by, status, error, started_at, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(log.id)
    .bind(log.tenant_id)
    .bind(log.automation_id)
    .bind(log.record_id)
    .bind(log.triggered_by.as_str())
    .bind(log.status.as_str())
    .bind(&log.error)
    .bind(log.started_at)
    .bind(log.completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append one step row to a tenant's log.
pub async fn append_step(pool: &PgPool, tenant_id: Uuid, log_id: Uuid, step: &Step) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        INSERT INTO execution_steps
            (log_id, sequence, node_id, node_kind, label, action_type, status, message, result, error, started_at, completed_at)
        SELECT id, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
        FROM execution_logs
        WHERE id = $1 AND tenant_id = $13
        "#,
    )
    .bind(log_id)
    .bind(step.sequence)
    .bind(&step.node_id)
    .bind(&step.node_kind)
    .bind(&step.label)
    .bind(&step.action_type)
    .bind(step.status.as_str())
    .bind(&step.message)
    .bind(&step.result)
    .bind(&step.error)
    .bind(step.started_at)
    .bind(step.completed_at)
    .bind(tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Move a running log to its terminal status. A log already terminal is
/// reported as `DbError::NotFound`.
pub async fn finish_execution_log(
    pool: &PgPool,
    tenant_id: Uuid,
    log_id: Uuid,
    status: RunStatus,
    error: Option<String>,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE execution_logs
        SET status = $1, error = $2, completed_at = $3
        WHERE id = $4 AND tenant_id = $5 AND status = 'running'
        "#,
    )
    .bind(status.as_str())
    .bind(error)
    .bind(at)
    .bind(log_id)
    .bind(tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Load a log with all of its steps in sequence order.
pub async fn get_execution_log(pool: &PgPool, tenant_id: Uuid, log_id: Uuid) -> Result<Option<ExecutionLog>, DbError> {
    let Some(row) = sqlx::query_as::<_, ExecutionLogRow>(
        r#"
        SELECT id, tenant_id, automation_id, record_id, triggered_by, status, error, started_at, completed_at
        FROM execution_logs
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(log_id)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let steps = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT sequence, node_id, node_kind, label, action_type, status, message, result, error, started_at, completed_at
        FROM execution_steps
        WHERE log_id = $1
        ORDER BY sequence ASC
        "#,
    )
    .bind(log_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|s| {
        Ok(Step {
            sequence: s.sequence,
            node_id: s.node_id,
            node_kind: s.node_kind,
            label: s.label,
            action_type: s.action_type,
            status: decode(&s.status)?,
            message: s.message,
            result: s.result,
            error: s.error,
            started_at: s.started_at,
            completed_at: s.completed_at,
        })
    })
    .collect::<Result<Vec<_>, DbError>>()?;

    Ok(Some(ExecutionLog {
        id: row.id,
        tenant_id: row.tenant_id,
        automation_id: row.automation_id,
        record_id: row.record_id,
        triggered_by: decode(&row.triggered_by)?,
        status: decode(&row.status)?,
        steps,
        error: row.error,
        started_at: row.started_at,
        completed_at: row.completed_at,
    }))
}
