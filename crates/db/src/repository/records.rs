//! Record reads/writes, tag membership and catalog name lookups.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::decode;
use crate::{
    models::{Record, RecordUpdate, Temperature},
    DbError,
};

#[derive(FromRow)]
struct RecordRow {
    id: Uuid,
    tenant_id: Uuid,
    account_id: Option<Uuid>,
    status_id: Option<Uuid>,
    temperature: Option<String>,
    is_complete: bool,
    assigned_to_id: Option<Uuid>,
}

/// Load a record together with its tag and motivation memberships.
pub async fn get_record(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<Option<Record>, DbError> {
    let Some(row) = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT id, tenant_id, account_id, status_id, temperature, is_complete, assigned_to_id
        FROM records
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let tag_ids: Vec<Uuid> = sqlx::query_scalar("SELECT tag_id FROM record_tags WHERE record_id = $1")
        .bind(id)
        .fetch_all(pool)
        .await?;
    let motivation_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT motivation_id FROM record_motivations WHERE record_id = $1")
            .bind(id)
            .fetch_all(pool)
            .await?;

    let temperature = row
        .temperature
        .as_deref()
        .map(decode::<Temperature>)
        .transpose()?;

    Ok(Some(Record {
        id: row.id,
        tenant_id: row.tenant_id,
        account_id: row.account_id,
        status_id: row.status_id,
        temperature,
        is_complete: row.is_complete,
        assigned_to_id: row.assigned_to_id,
        tag_ids: tag_ids.into_iter().collect(),
        motivation_ids: motivation_ids.into_iter().collect(),
    }))
}

/// Apply a single-field update. Returns `DbError::NotFound` if no row matched.
pub async fn update_record(
    pool: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    update: RecordUpdate,
) -> Result<(), DbError> {
    let query = match update {
        RecordUpdate::Status(status_id) => {
            sqlx::query("UPDATE records SET status_id = $1 WHERE id = $2 AND tenant_id = $3").bind(status_id)
        }
        RecordUpdate::Temperature(t) => {
            sqlx::query("UPDATE records SET temperature = $1 WHERE id = $2 AND tenant_id = $3").bind(t.as_str())
        }
        RecordUpdate::AssignedTo(user_id) => {
            sqlx::query("UPDATE records SET assigned_to_id = $1 WHERE id = $2 AND tenant_id = $3").bind(user_id)
        }
        RecordUpdate::MarkComplete => {
            sqlx::query("UPDATE records SET is_complete = $1 WHERE id = $2 AND tenant_id = $3").bind(true)
        }
    };

    let result = query.bind(id).bind(tenant_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Insert a tag membership unless it already exists.
///
/// Returns `DbError::NotFound` if the record doesn't exist for the tenant.
pub async fn add_tag(pool: &PgPool, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError> {
    let (found, inserted): (bool, bool) = sqlx::query_as(
        r#"
        WITH target AS (
            SELECT id FROM records WHERE id = $1 AND tenant_id = $3
        ), inserted AS (
            INSERT INTO record_tags (record_id, tag_id)
            SELECT id, $2 FROM target
            ON CONFLICT (record_id, tag_id) DO NOTHING
            RETURNING 1
        )
        SELECT EXISTS (SELECT 1 FROM target), EXISTS (SELECT 1 FROM inserted)
        "#,
    )
    .bind(record_id)
    .bind(tag_id)
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;

    if !found {
        return Err(DbError::NotFound);
    }
    Ok(inserted)
}

/// Delete a tag membership; deleting an absent membership is not an error.
pub async fn remove_tag(pool: &PgPool, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        r#"
        DELETE FROM record_tags rt
        USING records r
        WHERE rt.record_id = r.id AND r.id = $1 AND r.tenant_id = $3 AND rt.tag_id = $2
        "#,
    )
    .bind(record_id)
    .bind(tag_id)
    .bind(tenant_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Which catalog table a name lookup targets.
#[derive(Debug, Clone, Copy)]
pub enum Catalog {
    Status,
    Tag,
    User,
}

/// Resolve the current display name of a catalog entry.
pub async fn catalog_name(
    pool: &PgPool,
    catalog: Catalog,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Option<String>, DbError> {
    let sql = match catalog {
        Catalog::Status => "SELECT name FROM statuses WHERE id = $1 AND tenant_id = $2",
        Catalog::Tag => "SELECT name FROM tags WHERE id = $1 AND tenant_id = $2",
        Catalog::User => "SELECT name FROM users WHERE id = $1 AND tenant_id = $2",
    };

    let name: Option<String> = sqlx::query_scalar(sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

    Ok(name)
}
