//! Automation reads and run-counter updates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::Automation, DbError};

const AUTOMATION_COLUMNS: &str = "id, tenant_id, name, is_active, is_draft, workflow, \
     run_count, last_run_at, created_at, updated_at";

/// Fetch a single automation scoped to its tenant.
pub async fn get_automation(
    pool: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Option<Automation>, DbError> {
    let row = sqlx::query_as::<_, Automation>(&format!(
        "SELECT {AUTOMATION_COLUMNS} FROM automations WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return the tenant's active automations, oldest first.
pub async fn list_active_automations(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Automation>, DbError> {
    let rows = sqlx::query_as::<_, Automation>(&format!(
        "SELECT {AUTOMATION_COLUMNS} FROM automations \
         WHERE tenant_id = $1 AND is_active = TRUE ORDER BY created_at ASC"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Atomically bump `run_count` and stamp `last_run_at`.
pub async fn record_successful_run(
    pool: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE automations
        SET run_count = run_count + 1, last_run_at = $1
        WHERE id = $2 AND tenant_id = $3
        "#,
    )
    .bind(at)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
