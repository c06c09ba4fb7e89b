//! `ActionExecutor`: applies one catalog action to the run's record.
//!
//! Every action performs exactly one store mutation. All of them except
//! `send_notification` also append one activity entry whose text resolves
//! referenced ids (status, tag, user) to their display names at the moment
//! the action runs.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use db::models::{ActivityEntry, BoardPosition, NewNotification, NewTask, RecordUpdate};
use db::{DbError, Store};

use crate::{ActionConfig, ExecutionContext, NodeError, TaskAssignment};

const UNKNOWN_NAME: &str = "Unknown";

/// What an applied action reports back to the step log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action ran; carries a human-readable summary.
    Applied(String),
    /// Nothing was changed; carries the reason.
    Skipped(String),
}

impl ActionOutcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Applied(m) | Self::Skipped(m) => m,
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    store: Arc<dyn Store>,
}

impl ActionExecutor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Apply `action` to the record of `ctx`.
    ///
    /// # Errors
    /// Any store failure, or [`NodeError::RecordNotFound`] when the record
    /// vanished before a write.
    #[instrument(skip(self, ctx), fields(action = action.action_type(), record_id = %ctx.record_id))]
    pub async fn apply(&self, action: &ActionConfig, ctx: &ExecutionContext) -> Result<ActionOutcome, NodeError> {
        match action {
            ActionConfig::UpdateStatus { status_id } => {
                self.update(ctx, RecordUpdate::Status(*status_id)).await?;
                let name = self.status_name(ctx, *status_id).await;
                let message = format!("Status changed to \"{name}\"");
                self.log_activity(ctx, "status_changed", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::UpdateTemperature { temperature } => {
                self.update(ctx, RecordUpdate::Temperature(*temperature)).await?;
                let message = format!("Temperature set to {temperature}");
                self.log_activity(ctx, "temperature_changed", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::AddTag { tag_id } => {
                let inserted = self
                    .store
                    .add_tag(ctx.tenant_id, ctx.record_id, *tag_id)
                    .await
                    .map_err(|e| not_found_as_record(e, ctx))?;
                let name = self.tag_name(ctx, *tag_id).await;
                let message = if inserted {
                    format!("Tag \"{name}\" added")
                } else {
                    format!("Tag \"{name}\" already present")
                };
                self.log_activity(ctx, "tag_added", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::RemoveTag { tag_id } => {
                let removed = self.store.remove_tag(ctx.tenant_id, ctx.record_id, *tag_id).await?;
                let name = self.tag_name(ctx, *tag_id).await;
                let message = if removed {
                    format!("Tag \"{name}\" removed")
                } else {
                    format!("Tag \"{name}\" was not present")
                };
                self.log_activity(ctx, "tag_removed", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::AssignUser { user_id } => {
                self.update(ctx, RecordUpdate::AssignedTo(*user_id)).await?;
                let name = self.user_name(ctx, *user_id).await;
                let message = format!("Assigned to {name}");
                self.log_activity(ctx, "assigned", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::MarkComplete => {
                self.update(ctx, RecordUpdate::MarkComplete).await?;
                let message = "Marked as complete".to_string();
                self.log_activity(ctx, "completed", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::AddToBoard { board_id, column_id } => {
                // Keyed by (record, column): re-adding keeps the existing slot.
                let order = match self
                    .store
                    .board_position(ctx.tenant_id, ctx.record_id, *column_id)
                    .await?
                {
                    Some(existing) => existing.order,
                    None => self
                        .store
                        .max_board_order(ctx.tenant_id, *column_id)
                        .await?
                        .map_or(0, |max| max + 1),
                };
                self.store
                    .upsert_board_position(BoardPosition {
                        tenant_id: ctx.tenant_id,
                        record_id: ctx.record_id,
                        board_id: *board_id,
                        column_id: *column_id,
                        order,
                    })
                    .await?;
                let message = format!("Added to board at position {order}");
                self.log_activity(ctx, "board_added", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::CreateTask { title, description, priority, due_in_days, assignment } => {
                let record = self.store.get_record(ctx.tenant_id, ctx.record_id).await?;
                let Some((account_id, record_assignee)) =
                    record.and_then(|r| r.account_id.map(|account| (account, r.assigned_to_id)))
                else {
                    debug!("record has no account; task not created");
                    return Ok(ActionOutcome::Skipped(format!(
                        "Task \"{title}\" not created: record has no account"
                    )));
                };

                let assigned_to_id = match assignment {
                    TaskAssignment::User { user_id } => Some(*user_id),
                    TaskAssignment::RecordAssignee => record_assignee,
                    TaskAssignment::RoundRobin | TaskAssignment::Unassigned => None,
                };

                let task = self
                    .store
                    .create_task(NewTask {
                        tenant_id: ctx.tenant_id,
                        account_id,
                        record_id: ctx.record_id,
                        title: title.clone(),
                        description: description.clone(),
                        priority: *priority,
                        due_at: due_in_days.map(|days| Utc::now() + Duration::days(i64::from(days))),
                        assigned_to_id,
                    })
                    .await?;
                let message = format!("Task \"{}\" created", task.title);
                self.log_activity(ctx, "task_created", &message).await?;
                Ok(ActionOutcome::Applied(message))
            }

            ActionConfig::SendNotification { user_id, title, message } => {
                self.store
                    .create_notification(NewNotification {
                        tenant_id: ctx.tenant_id,
                        user_id: *user_id,
                        record_id: ctx.record_id,
                        title: title.clone(),
                        message: message.clone(),
                    })
                    .await?;
                let name = self.user_name(ctx, *user_id).await;
                Ok(ActionOutcome::Applied(format!("Notification sent to {name}")))
            }

            // TODO: needs a suspended-run state plus a resume poller before
            // this can do anything but report itself.
            ActionConfig::Wait { duration, unit } => Ok(ActionOutcome::Skipped(format!(
                "Wait of {duration} {unit} is not supported; continued without delay"
            ))),

            ActionConfig::Unknown => Ok(ActionOutcome::Skipped("Unknown action type; nothing applied".into())),
        }
    }

    async fn update(&self, ctx: &ExecutionContext, update: RecordUpdate) -> Result<(), NodeError> {
        self.store
            .update_record(ctx.tenant_id, ctx.record_id, update)
            .await
            .map_err(|e| not_found_as_record(e, ctx))
    }

    async fn log_activity(&self, ctx: &ExecutionContext, kind: &str, description: &str) -> Result<(), NodeError> {
        self.store
            .append_activity(ActivityEntry::new(
                ctx.tenant_id,
                ctx.record_id,
                kind,
                description,
                ctx.activity_source(),
            ))
            .await?;
        Ok(())
    }

    async fn status_name(&self, ctx: &ExecutionContext, id: Uuid) -> String {
        display_name(self.store.status_name(ctx.tenant_id, id).await, id)
    }

    async fn tag_name(&self, ctx: &ExecutionContext, id: Uuid) -> String {
        display_name(self.store.tag_name(ctx.tenant_id, id).await, id)
    }

    async fn user_name(&self, ctx: &ExecutionContext, id: Uuid) -> String {
        display_name(self.store.user_name(ctx.tenant_id, id).await, id)
    }
}

/// Names are cosmetic: a failed lookup must not fail the action.
fn display_name(lookup: Result<Option<String>, DbError>, id: Uuid) -> String {
    match lookup {
        Ok(Some(name)) => name,
        Ok(None) => UNKNOWN_NAME.to_string(),
        Err(e) => {
            warn!(%id, error = %e, "display name lookup failed");
            UNKNOWN_NAME.to_string()
        }
    }
}

fn not_found_as_record(err: DbError, ctx: &ExecutionContext) -> NodeError {
    match err {
        DbError::NotFound => NodeError::RecordNotFound(ctx.record_id),
        other => NodeError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::memory::{MemoryStore, StoreOp};
    use db::models::{Record, TaskPriority, Temperature, TriggerType};

    struct Fixture {
        store: Arc<MemoryStore>,
        executor: ActionExecutor,
        ctx: ExecutionContext,
    }

    fn fixture_with(record: impl FnOnce(&mut Record)) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();
        let mut rec = Record::new(tenant);
        record(&mut rec);
        let ctx = ExecutionContext::new(tenant, Uuid::new_v4(), "Lead router", rec.id, TriggerType::RecordCreated);
        store.insert_record(rec);
        Fixture { executor: ActionExecutor::new(store.clone()), store, ctx }
    }

    fn fixture() -> Fixture {
        fixture_with(|_| {})
    }

    #[tokio::test]
    async fn update_status_resolves_current_name() {
        let f = fixture();
        let status = Uuid::new_v4();
        f.store.insert_status(f.ctx.tenant_id, status, "Qualified");

        let outcome = f
            .executor
            .apply(&ActionConfig::UpdateStatus { status_id: status }, &f.ctx)
            .await
            .unwrap();

        assert_eq!(outcome, ActionOutcome::Applied("Status changed to \"Qualified\"".into()));
        assert_eq!(f.store.record(f.ctx.record_id).unwrap().status_id, Some(status));
        let activity = f.store.activity();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].source, "Automation: Lead router");
        assert_eq!(activity[0].kind, "status_changed");
    }

    #[tokio::test]
    async fn missing_catalog_name_falls_back() {
        let f = fixture();
        let outcome = f
            .executor
            .apply(&ActionConfig::AssignUser { user_id: Uuid::new_v4() }, &f.ctx)
            .await
            .unwrap();
        assert_eq!(outcome.message(), "Assigned to Unknown");
    }

    #[tokio::test]
    async fn add_tag_twice_keeps_one_membership() {
        let f = fixture();
        let tag = Uuid::new_v4();
        let action = ActionConfig::AddTag { tag_id: tag };

        f.executor.apply(&action, &f.ctx).await.unwrap();
        f.executor.apply(&action, &f.ctx).await.unwrap();

        let record = f.store.record(f.ctx.record_id).unwrap();
        assert_eq!(record.tag_ids.len(), 1);
        assert!(record.tag_ids.contains(&tag));
    }

    #[tokio::test]
    async fn remove_absent_tag_is_a_no_op() {
        let f = fixture();
        let outcome = f
            .executor
            .apply(&ActionConfig::RemoveTag { tag_id: Uuid::new_v4() }, &f.ctx)
            .await
            .expect("removing an absent tag must not fail");
        assert!(matches!(outcome, ActionOutcome::Applied(_)));
        assert!(f.store.record(f.ctx.record_id).unwrap().tag_ids.is_empty());
    }

    #[tokio::test]
    async fn add_to_board_appends_to_column() {
        let f = fixture();
        let board = Uuid::new_v4();
        let column = Uuid::new_v4();
        let action = ActionConfig::AddToBoard { board_id: board, column_id: column };

        f.executor.apply(&action, &f.ctx).await.unwrap();

        // A second record in the same column lands after the first.
        let other = Record::new(f.ctx.tenant_id);
        let mut other_ctx = f.ctx.clone();
        other_ctx.record_id = other.id;
        f.store.insert_record(other);
        f.executor.apply(&action, &other_ctx).await.unwrap();

        // Re-adding the first record keeps its slot.
        f.executor.apply(&action, &f.ctx).await.unwrap();

        let positions = f.store.board_positions();
        assert_eq!(positions.len(), 2);
        let order_of = |record_id| positions.iter().find(|p| p.record_id == record_id).unwrap().order;
        assert_eq!(order_of(f.ctx.record_id), 0);
        assert_eq!(order_of(other_ctx.record_id), 1);
    }

    #[tokio::test]
    async fn create_task_without_account_is_skipped() {
        let f = fixture();
        let outcome = f
            .executor
            .apply(
                &ActionConfig::CreateTask {
                    title: "Call back".into(),
                    description: None,
                    priority: TaskPriority::High,
                    due_in_days: Some(2),
                    assignment: TaskAssignment::Unassigned,
                },
                &f.ctx,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Skipped(_)));
        assert!(f.store.tasks().is_empty());
        assert!(f.store.activity().is_empty());
    }

    #[tokio::test]
    async fn create_task_assignment_modes() {
        let assignee = Uuid::new_v4();
        let account = Uuid::new_v4();
        let f = fixture_with(|r| {
            r.account_id = Some(account);
            r.assigned_to_id = Some(assignee);
        });

        let task = |assignment| ActionConfig::CreateTask {
            title: "Follow up".into(),
            description: Some("Send pricing".into()),
            priority: TaskPriority::Medium,
            due_in_days: Some(3),
            assignment,
        };
        f.executor.apply(&task(TaskAssignment::RecordAssignee), &f.ctx).await.unwrap();
        f.executor.apply(&task(TaskAssignment::RoundRobin), &f.ctx).await.unwrap();

        let tasks = f.store.tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.account_id == account && t.due_at.is_some()));
        assert_eq!(tasks[0].assigned_to_id, Some(assignee));
        assert_eq!(tasks[1].assigned_to_id, None);
    }

    #[tokio::test]
    async fn notification_writes_no_activity() {
        let f = fixture();
        let user = Uuid::new_v4();
        f.store.insert_user(f.ctx.tenant_id, user, "Dana");
        let outcome = f
            .executor
            .apply(
                &ActionConfig::SendNotification {
                    user_id: user,
                    title: "Hot lead".into(),
                    message: "Call now".into(),
                },
                &f.ctx,
            )
            .await
            .unwrap();
        assert_eq!(outcome.message(), "Notification sent to Dana");
        assert_eq!(f.store.notifications().len(), 1);
        assert!(f.store.activity().is_empty());
    }

    #[tokio::test]
    async fn wait_and_unknown_change_nothing() {
        let f = fixture();
        let before = f.store.record(f.ctx.record_id);

        let wait = f
            .executor
            .apply(&ActionConfig::Wait { duration: 2, unit: crate::WaitUnit::Days }, &f.ctx)
            .await
            .unwrap();
        let unknown = f.executor.apply(&ActionConfig::Unknown, &f.ctx).await.unwrap();

        assert!(matches!(wait, ActionOutcome::Skipped(ref m) if m.contains("2 days")));
        assert!(matches!(unknown, ActionOutcome::Skipped(_)));
        assert_eq!(f.store.record(f.ctx.record_id), before);
        assert!(f.store.activity().is_empty());
    }

    #[tokio::test]
    async fn write_to_vanished_record_fails() {
        let f = fixture();
        f.store.delete_record(f.ctx.record_id);
        let err = f
            .executor
            .apply(&ActionConfig::UpdateTemperature { temperature: Temperature::Hot }, &f.ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::RecordNotFound(id) if id == f.ctx.record_id));
    }

    #[tokio::test]
    async fn store_failure_is_propagated() {
        let f = fixture();
        f.store.fail_on(StoreOp::UpdateRecord);
        let err = f.executor.apply(&ActionConfig::MarkComplete, &f.ctx).await.unwrap_err();
        assert!(matches!(err, NodeError::Store(DbError::Unavailable(_))));
    }
}
