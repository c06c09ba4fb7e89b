//! Store capabilities consumed by the engine.
//!
//! Each trait covers one outbound concern. Every method takes the tenant id
//! explicitly; implementations must never return or touch rows belonging to
//! another tenant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    ActivityEntry, Automation, BoardPosition, ExecutionLog, NewNotification, NewTask,
    Notification, Record, RecordUpdate, RunStatus, Step, Task,
};
use crate::DbError;

#[async_trait]
pub trait AutomationStore: Send + Sync {
    async fn get_automation(
        &self,
        tenant_id: Uuid,
        automation_id: Uuid,
    ) -> Result<Option<Automation>, DbError>;

    /// All automations of the tenant with `is_active = true`.
    async fn list_active_automations(&self, tenant_id: Uuid) -> Result<Vec<Automation>, DbError>;

    /// Increment `run_count` and set `last_run_at`.
    async fn record_successful_run(
        &self,
        tenant_id: Uuid,
        automation_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a record with its tag and motivation memberships.
    async fn get_record(&self, tenant_id: Uuid, record_id: Uuid) -> Result<Option<Record>, DbError>;

    /// Apply a single field write. `DbError::NotFound` if the record is gone.
    async fn update_record(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        update: RecordUpdate,
    ) -> Result<(), DbError>;

    /// Upsert a tag membership. Returns `true` if a row was inserted.
    async fn add_tag(&self, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError>;

    /// Delete a tag membership. Returns `true` if a row was deleted.
    async fn remove_tag(&self, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError>;
}

/// Display-name lookups, used only to render activity entries.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn status_name(&self, tenant_id: Uuid, status_id: Uuid) -> Result<Option<String>, DbError>;
    async fn tag_name(&self, tenant_id: Uuid, tag_id: Uuid) -> Result<Option<String>, DbError>;
    async fn user_name(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<String>, DbError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Task, DbError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, DbError>;
}

#[async_trait]
pub trait BoardPositionStore: Send + Sync {
    async fn board_position(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        column_id: Uuid,
    ) -> Result<Option<BoardPosition>, DbError>;

    /// Highest `order` currently used in the column, if any record is in it.
    async fn max_board_order(&self, tenant_id: Uuid, column_id: Uuid) -> Result<Option<i32>, DbError>;

    /// Insert, or overwrite the row keyed by `(record_id, column_id)`.
    async fn upsert_board_position(&self, position: BoardPosition) -> Result<(), DbError>;
}

#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), DbError>;
}

#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    async fn create_execution_log(&self, log: &ExecutionLog) -> Result<(), DbError>;

    /// Append one step row. `step.sequence` is unique within the log.
    async fn append_step(&self, tenant_id: Uuid, log_id: Uuid, step: &Step) -> Result<(), DbError>;

    /// Move the log to its terminal status.
    async fn finish_execution_log(
        &self,
        tenant_id: Uuid,
        log_id: Uuid,
        status: RunStatus,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Load a log with its steps ordered by sequence.
    async fn get_execution_log(&self, tenant_id: Uuid, log_id: Uuid) -> Result<Option<ExecutionLog>, DbError>;
}

/// Every capability the engine needs, bundled behind one trait object.
pub trait Store:
    AutomationStore
    + RecordStore
    + CatalogStore
    + TaskStore
    + NotificationStore
    + BoardPositionStore
    + ActivityLogStore
    + ExecutionLogStore
{
}

impl<T> Store for T where
    T: AutomationStore
        + RecordStore
        + CatalogStore
        + TaskStore
        + NotificationStore
        + BoardPositionStore
        + ActivityLogStore
        + ExecutionLogStore
{
}
