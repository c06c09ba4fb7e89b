//! `MemoryStore`: an in-process implementation of every store capability.
//!
//! Used by the engine's tests and by embedders that don't need Postgres.
//! Failures can be injected per operation to exercise the engine's error
//! paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    ActivityEntry, Automation, BoardPosition, ExecutionLog, NewNotification, NewTask,
    Notification, Record, RecordUpdate, RunStatus, Step, Task,
};
use crate::store::{
    ActivityLogStore, AutomationStore, BoardPositionStore, CatalogStore, ExecutionLogStore,
    NotificationStore, RecordStore, TaskStore,
};
use crate::DbError;

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ReadRecord,
    UpdateRecord,
    AddTag,
    RemoveTag,
    CreateTask,
    CreateNotification,
    UpsertBoardPosition,
    AppendActivity,
    AppendStep,
}

#[derive(Default)]
struct State {
    automations: HashMap<Uuid, Automation>,
    records: HashMap<Uuid, Record>,
    status_names: HashMap<(Uuid, Uuid), String>,
    tag_names: HashMap<(Uuid, Uuid), String>,
    user_names: HashMap<(Uuid, Uuid), String>,
    tasks: Vec<Task>,
    notifications: Vec<Notification>,
    board_positions: Vec<BoardPosition>,
    activity: Vec<ActivityEntry>,
    logs: HashMap<Uuid, ExecutionLog>,
    failing: HashSet<StoreOp>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(state: &State, op: StoreOp) -> Result<(), DbError> {
        if state.failing.contains(&op) {
            return Err(DbError::Unavailable(format!("{op:?} rejected")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Seeding and inspection
    // -----------------------------------------------------------------------

    pub fn insert_automation(&self, automation: Automation) {
        self.lock().automations.insert(automation.id, automation);
    }

    pub fn insert_record(&self, record: Record) {
        self.lock().records.insert(record.id, record);
    }

    pub fn delete_record(&self, record_id: Uuid) {
        self.lock().records.remove(&record_id);
    }

    pub fn insert_status(&self, tenant_id: Uuid, status_id: Uuid, name: impl Into<String>) {
        self.lock().status_names.insert((tenant_id, status_id), name.into());
    }

    pub fn insert_tag(&self, tenant_id: Uuid, tag_id: Uuid, name: impl Into<String>) {
        self.lock().tag_names.insert((tenant_id, tag_id), name.into());
    }

    pub fn insert_user(&self, tenant_id: Uuid, user_id: Uuid, name: impl Into<String>) {
        self.lock().user_names.insert((tenant_id, user_id), name.into());
    }

    /// Make every subsequent call of `op` fail with [`DbError::Unavailable`].
    pub fn fail_on(&self, op: StoreOp) {
        self.lock().failing.insert(op);
    }

    pub fn automation(&self, id: Uuid) -> Option<Automation> {
        self.lock().automations.get(&id).cloned()
    }

    pub fn record(&self, id: Uuid) -> Option<Record> {
        self.lock().records.get(&id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn board_positions(&self) -> Vec<BoardPosition> {
        self.lock().board_positions.clone()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.lock().activity.clone()
    }

    pub fn logs(&self) -> Vec<ExecutionLog> {
        self.lock().logs.values().cloned().collect()
    }
}

#[async_trait]
impl AutomationStore for MemoryStore {
    async fn get_automation(&self, tenant_id: Uuid, automation_id: Uuid) -> Result<Option<Automation>, DbError> {
        Ok(self
            .lock()
            .automations
            .get(&automation_id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_active_automations(&self, tenant_id: Uuid) -> Result<Vec<Automation>, DbError> {
        let mut found: Vec<Automation> = self
            .lock()
            .automations
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.is_active)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    async fn record_successful_run(&self, tenant_id: Uuid, automation_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        let mut state = self.lock();
        let automation = state
            .automations
            .get_mut(&automation_id)
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or(DbError::NotFound)?;
        automation.run_count += 1;
        automation.last_run_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_record(&self, tenant_id: Uuid, record_id: Uuid) -> Result<Option<Record>, DbError> {
        let state = self.lock();
        Self::check(&state, StoreOp::ReadRecord)?;
        Ok(state
            .records
            .get(&record_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_record(&self, tenant_id: Uuid, record_id: Uuid, update: RecordUpdate) -> Result<(), DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::UpdateRecord)?;
        let record = state
            .records
            .get_mut(&record_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or(DbError::NotFound)?;
        match update {
            RecordUpdate::Status(id) => record.status_id = Some(id),
            RecordUpdate::Temperature(t) => record.temperature = Some(t),
            RecordUpdate::AssignedTo(id) => record.assigned_to_id = Some(id),
            RecordUpdate::MarkComplete => record.is_complete = true,
        }
        Ok(())
    }

    async fn add_tag(&self, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::AddTag)?;
        let record = state
            .records
            .get_mut(&record_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or(DbError::NotFound)?;
        Ok(record.tag_ids.insert(tag_id))
    }

    async fn remove_tag(&self, tenant_id: Uuid, record_id: Uuid, tag_id: Uuid) -> Result<bool, DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::RemoveTag)?;
        Ok(state
            .records
            .get_mut(&record_id)
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.tag_ids.remove(&tag_id))
            .unwrap_or(false))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn status_name(&self, tenant_id: Uuid, status_id: Uuid) -> Result<Option<String>, DbError> {
        Ok(self.lock().status_names.get(&(tenant_id, status_id)).cloned())
    }

    async fn tag_name(&self, tenant_id: Uuid, tag_id: Uuid) -> Result<Option<String>, DbError> {
        Ok(self.lock().tag_names.get(&(tenant_id, tag_id)).cloned())
    }

    async fn user_name(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<String>, DbError> {
        Ok(self.lock().user_names.get(&(tenant_id, user_id)).cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::CreateTask)?;
        let task = Task {
            id: Uuid::new_v4(),
            tenant_id: task.tenant_id,
            account_id: task.account_id,
            record_id: task.record_id,
            title: task.title,
            description: task.description,
            priority: task.priority,
            due_at: task.due_at,
            assigned_to_id: task.assigned_to_id,
            created_at: Utc::now(),
        };
        state.tasks.push(task.clone());
        Ok(task)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::CreateNotification)?;
        let notification = Notification {
            id: Uuid::new_v4(),
            tenant_id: notification.tenant_id,
            user_id: notification.user_id,
            record_id: notification.record_id,
            title: notification.title,
            message: notification.message,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }
}

#[async_trait]
impl BoardPositionStore for MemoryStore {
    async fn board_position(&self, tenant_id: Uuid, record_id: Uuid, column_id: Uuid) -> Result<Option<BoardPosition>, DbError> {
        Ok(self
            .lock()
            .board_positions
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.record_id == record_id && p.column_id == column_id)
            .cloned())
    }

    async fn max_board_order(&self, tenant_id: Uuid, column_id: Uuid) -> Result<Option<i32>, DbError> {
        Ok(self
            .lock()
            .board_positions
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.column_id == column_id)
            .map(|p| p.order)
            .max())
    }

    async fn upsert_board_position(&self, position: BoardPosition) -> Result<(), DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::UpsertBoardPosition)?;
        match state
            .board_positions
            .iter_mut()
            .find(|p| {
                p.tenant_id == position.tenant_id
                    && p.record_id == position.record_id
                    && p.column_id == position.column_id
            })
        {
            Some(existing) => *existing = position,
            None => state.board_positions.push(position),
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityLogStore for MemoryStore {
    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::AppendActivity)?;
        state.activity.push(entry);
        Ok(())
    }
}

#[async_trait]
impl ExecutionLogStore for MemoryStore {
    async fn create_execution_log(&self, log: &ExecutionLog) -> Result<(), DbError> {
        self.lock().logs.insert(log.id, log.clone());
        Ok(())
    }

    async fn append_step(&self, tenant_id: Uuid, log_id: Uuid, step: &Step) -> Result<(), DbError> {
        let mut state = self.lock();
        Self::check(&state, StoreOp::AppendStep)?;
        let log = state
            .logs
            .get_mut(&log_id)
            .filter(|l| l.tenant_id == tenant_id)
            .ok_or(DbError::NotFound)?;
        log.steps.push(step.clone());
        Ok(())
    }

    async fn finish_execution_log(
        &self,
        tenant_id: Uuid,
        log_id: Uuid,
        status: RunStatus,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let log = state
            .logs
            .get_mut(&log_id)
            .filter(|l| l.tenant_id == tenant_id && !l.status.is_terminal())
            .ok_or(DbError::NotFound)?;
        log.status = status;
        log.error = error;
        log.completed_at = Some(at);
        Ok(())
    }

    async fn get_execution_log(&self, tenant_id: Uuid, log_id: Uuid) -> Result<Option<ExecutionLog>, DbError> {
        Ok(self
            .lock()
            .logs
            .get(&log_id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tag_membership_is_a_set() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let record = Record::new(tenant);
        let record_id = record.id;
        let tag = Uuid::new_v4();
        store.insert_record(record);

        assert!(store.add_tag(tenant, record_id, tag).await.unwrap());
        assert!(!store.add_tag(tenant, record_id, tag).await.unwrap());
        assert_eq!(store.record(record_id).unwrap().tag_ids.len(), 1);

        assert!(store.remove_tag(tenant, record_id, tag).await.unwrap());
        assert!(!store.remove_tag(tenant, record_id, tag).await.unwrap());
    }

    #[tokio::test]
    async fn other_tenants_rows_are_invisible() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let record = Record::new(tenant);
        let record_id = record.id;
        store.insert_record(record);

        let stranger = Uuid::new_v4();
        assert!(store.get_record(stranger, record_id).await.unwrap().is_none());
        assert!(matches!(
            store.update_record(stranger, record_id, RecordUpdate::MarkComplete).await,
            Err(DbError::NotFound)
        ));
    }

    #[tokio::test]
    async fn injected_failure_applies_to_one_operation() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let record = Record::new(tenant);
        let record_id = record.id;
        store.insert_record(record);
        store.fail_on(StoreOp::AddTag);

        assert!(matches!(
            store.add_tag(tenant, record_id, Uuid::new_v4()).await,
            Err(DbError::Unavailable(_))
        ));
        store
            .update_record(tenant, record_id, RecordUpdate::MarkComplete)
            .await
            .expect("other operations keep working");
    }

    #[tokio::test]
    async fn board_upsert_only_replaces_rows_of_the_same_tenant() {
        let store = MemoryStore::new();
        let (tenant, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (record_id, board_id, column_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let position = |tenant_id, order| BoardPosition { tenant_id, record_id, board_id, column_id, order };

        store.upsert_board_position(position(tenant, 0)).await.unwrap();
        store.upsert_board_position(position(other, 7)).await.unwrap();
        store.upsert_board_position(position(tenant, 3)).await.unwrap();

        let mine = store.board_position(tenant, record_id, column_id).await.unwrap().unwrap();
        let theirs = store.board_position(other, record_id, column_id).await.unwrap().unwrap();
        assert_eq!(mine.order, 3);
        assert_eq!(theirs.order, 7);
        assert_eq!(store.board_positions().len(), 2);
    }

    #[tokio::test]
    async fn log_leaves_running_only_once() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let log = ExecutionLog::start(
            Uuid::new_v4(),
            tenant,
            Uuid::new_v4(),
            Uuid::new_v4(),
            crate::models::TriggerType::RecordCreated,
        );
        store.create_execution_log(&log).await.unwrap();

        store
            .finish_execution_log(tenant, log.id, RunStatus::Completed, None, Utc::now())
            .await
            .unwrap();
        assert!(store
            .finish_execution_log(tenant, log.id, RunStatus::Failed, None, Utc::now())
            .await
            .is_err());
    }
}
