//! Side-effect tables written by automation actions: tasks, notifications,
//! board positions and the activity feed.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::decode;
use crate::{
    models::{ActivityEntry, BoardPosition, NewNotification, NewTask, Notification, Task},
    DbError,
};

// ---------------------------------------------------------------------------
// tasks
// ---------------------------------------------------------------------------

#[derive(FromRow)]
struct TaskRow {
    id: Uuid,
    tenant_id: Uuid,
    account_id: Uuid,
    record_id: Uuid,
    title: String,
    description: Option<String>,
    priority: String,
    due_at: Option<DateTime<Utc>>,
    assigned_to_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

pub async fn create_task(pool: &PgPool, task: NewTask) -> Result<Task, DbError> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO tasks
            (id, tenant_id, account_id, record_id, title, description, priority, due_at, assigned_to_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, tenant_id, account_id, record_id, title, description, priority, due_at, assigned_to_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(task.tenant_id)
    .bind(task.account_id)
    .bind(task.record_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.priority.as_str())
    .bind(task.due_at)
    .bind(task.assigned_to_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(Task {
        id: row.id,
        tenant_id: row.tenant_id,
        account_id: row.account_id,
        record_id: row.record_id,
        title: row.title,
        description: row.description,
        priority: decode(&row.priority)?,
        due_at: row.due_at,
        assigned_to_id: row.assigned_to_id,
        created_at: row.created_at,
    })
}

// ---------------------------------------------------------------------------
// notifications
// ---------------------------------------------------------------------------

pub async fn create_notification(pool: &PgPool, notification: NewNotification) -> Result<Notification, DbError> {
    let row = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (id, tenant_id, user_id, record_id, title, message, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
        RETURNING id, tenant_id, user_id, record_id, title, message, is_read, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(notification.tenant_id)
    .bind(notification.user_id)
    .bind(notification.record_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// board_positions
// ---------------------------------------------------------------------------

pub async fn board_position(
    pool: &PgPool,
    tenant_id: Uuid,
    record_id: Uuid,
    column_id: Uuid,
) -> Result<Option<BoardPosition>, DbError> {
    let row = sqlx::query_as::<_, BoardPosition>(
        r#"
        SELECT tenant_id, record_id, board_id, column_id, position
        FROM board_positions
        WHERE tenant_id = $1 AND record_id = $2 AND column_id = $3
        "#,
    )
    .bind(tenant_id)
    .bind(record_id)
    .bind(column_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn max_board_order(pool: &PgPool, tenant_id: Uuid, column_id: Uuid) -> Result<Option<i32>, DbError> {
    let max: Option<i32> = sqlx::query_scalar(
        "SELECT MAX(position) FROM board_positions WHERE tenant_id = $1 AND column_id = $2",
    )
    .bind(tenant_id)
    .bind(column_id)
    .fetch_one(pool)
    .await?;

    Ok(max)
}

pub async fn upsert_board_position(pool: &PgPool, position: BoardPosition) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO board_positions (tenant_id, record_id, board_id, column_id, position)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (record_id, column_id) DO UPDATE
        SET board_id = EXCLUDED.board_id, position = EXCLUDED.position
        WHERE board_positions.tenant_id = EXCLUDED.tenant_id
        "#,
    )
    .bind(position.tenant_id)
    .bind(position.record_id)
    .bind(position.board_id)
    .bind(position.column_id)
    .bind(position.order)
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// activity_logs
// ---------------------------------------------------------------------------

pub async fn append_activity(pool: &PgPool, entry: ActivityEntry) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO activity_logs (id, tenant_id, record_id, kind, description, source, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.tenant_id)
    .bind(entry.record_id)
    .bind(&entry.kind)
    .bind(&entry.description)
    .bind(&entry.source)
    .bind(entry.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
