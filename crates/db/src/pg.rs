//! `PgStore`: the Postgres-backed implementation of every store capability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    ActivityEntry, Automation, BoardPosition, ExecutionLog, NewNotification, NewTask,
    Notification, Record, RecordUpdate, RunStatus, Step, Task,
};
use crate::repository::{
    automations, effects, executions,
    records::{self, Catalog},
};
use crate::store::{
    ActivityLogStore, AutomationStore, BoardPositionStore, CatalogStore, ExecutionLogStore,
    NotificationStore, RecordStore, TaskStore,
};
use crate::{DbError, DbPool};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AutomationStore for PgStore {
    async fn get_automation(&self, tenant_id: Uuid, automation_id: Uuid) -> Result<Option<Automation>, DbError> {
        automations::get_automation(&self.pool, tenant_id, automation_id).await
    }

    async fn list_active_automations(&self, tenant_id: Uuid) -> Result<Vec<Automation>, DbError> {
        automations::list_active_automations(&self.pool, tenant_id).await
    }

    async fn record_successful_run(&self, tenant_id: Uuid, automation_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        automations::record_successful_run(&self.pool, tenant_id, automation_id, at).await
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn get_record(&self, tenant_id: Uuid, record_id: Uuid) -> Result<Option<Record>, DbError> {
        records::get_record(&self.pool, tenant_id, record_id).await
    }

    async fn update_record(&self, tenant_id: Uuid, record_id: Uuid, update: RecordUpdate) -> Result<(), DbError> {
        records::update_record(&self.pool, tenant_id, record_id, update).await
    }

    async fn add_tag(&self, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError> {
        records::add_tag(&self.pool, tenant_id, record_id, tag_id).await
    }

    async fn remove_tag(&self, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError> {
        records::remove_tag(&self.pool, tenant_id, record_id, tag_id).await
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn status_name(&self, tenant_id: Uuid, status_id: Uuid) -> Result<Option<String>, DbError> {
        records::catalog_name(&self.pool, Catalog::Status, tenant_id, status_id).await
    }

    async fn tag_name(&self, tenant_id: Uuid, tag_id: Uuid) -> Result<Option<String>, DbError> {
        records::catalog_name(&self.pool, Catalog::Tag, tenant_id, tag_id).await
    }

    async fn user_name(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<String>, DbError> {
        records::catalog_name(&self.pool, Catalog::User, tenant_id, user_id).await
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, DbError> {
        effects::create_task(&self.pool, task).await
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, DbError> {
        effects::create_notification(&self.pool, notification).await
    }
}

#[async_trait]
impl BoardPositionStore for PgStore {
    async fn board_position(&self, tenant_id: Uuid, record_id: Uuid, column_id: Uuid) -> Result<Option<BoardPosition>, DbError> {
        effects::board_position(&self.pool, tenant_id, record_id, column_id).await
    }

    async fn max_board_order(&self, tenant_id: Uuid, column_id: Uuid) -> Result<Option<i32>, DbError> {
        effects::max_board_order(&self.pool, tenant_id, column_id).await
    }

    async fn upsert_board_position(&self, position: BoardPosition) -> Result<(), DbError> {
        effects::upsert_board_position(&self.pool, position).await
    }
}

#[async_trait]
impl ActivityLogStore for PgStore {
    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), DbError> {
        effects::append_activity(&self.pool, entry).await
    }
}

#[async_trait]
impl ExecutionLogStore for PgStore {
    async fn create_execution_log(&self, log: &ExecutionLog) -> Result<(), DbError> {
        executions::create_execution_log(&self.pool, log).await
    }

    async fn append_step(&self, tenant_id: Uuid, log_id: Uuid, step: &Step) -> Result<(), DbError> {
        executions::append_step(&self.pool, tenant_id, log_id, step).await
    }

    async fn finish_execution_log(
        &self,
        tenant_id: Uuid,
        log_id: Uuid,
        status: RunStatus,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        executions::finish_execution_log(&self.pool, tenant_id, log_id, status, error, at).await
    }

    async fn get_execution_log(&self, tenant_id: Uuid, log_id: Uuid) -> Result<Option<ExecutionLog>, DbError> {
        executions::get_execution_log(&self.pool, tenant_id, log_id).await
    }
}
