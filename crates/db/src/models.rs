//! Records that cross the store boundary.
//!
//! These are *persistence* models: they carry no engine behaviour.
//! The typed workflow graph lives in the `engine` crate; here an automation
//! only holds the raw JSON payload of its graph.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared vocabularies
// ---------------------------------------------------------------------------

/// Business events that can start an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    RecordCreated,
    StatusChanged,
    TagAdded,
    TagRemoved,
    TemperatureChanged,
    RecordAssigned,
    TaskCompleted,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordCreated => "record_created",
            Self::StatusChanged => "status_changed",
            Self::TagAdded => "tag_added",
            Self::TagRemoved => "tag_removed",
            Self::TemperatureChanged => "temperature_changed",
            Self::RecordAssigned => "record_assigned",
            Self::TaskCompleted => "task_completed",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "record_created"      => Ok(Self::RecordCreated),
            "status_changed"      => Ok(Self::StatusChanged),
            "tag_added"           => Ok(Self::TagAdded),
            "tag_removed"         => Ok(Self::TagRemoved),
            "temperature_changed" => Ok(Self::TemperatureChanged),
            "record_assigned"     => Ok(Self::RecordAssigned),
            "task_completed"      => Ok(Self::TaskCompleted),
            other                 => Err(format!("unknown trigger type: {other}")),
        }
    }
}

/// Lead temperature of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Temperature {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot"  => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            other  => Err(format!("unknown temperature: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// automations
// ---------------------------------------------------------------------------

/// A user-authored automation with its embedded workflow payload.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Automation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub is_draft: bool,
    /// Raw workflow graph (nodes + edges). `None` until the user saves one.
    pub workflow: Option<serde_json::Value>,
    pub run_count: i64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    /// Convenience constructor: active, not a draft, never run.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, workflow: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            is_active: true,
            is_draft: false,
            workflow,
            run_count: 0,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// records
// ---------------------------------------------------------------------------

/// A CRM record loaded together with its tag and motivation memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Owning account; tasks created by automations are filed under it.
    pub account_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub temperature: Option<Temperature>,
    pub is_complete: bool,
    pub assigned_to_id: Option<Uuid>,
    pub tag_ids: BTreeSet<Uuid>,
    pub motivation_ids: BTreeSet<Uuid>,
}

impl Record {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            account_id: None,
            status_id: None,
            temperature: None,
            is_complete: false,
            assigned_to_id: None,
            tag_ids: BTreeSet::new(),
            motivation_ids: BTreeSet::new(),
        }
    }
}

/// A single-field write against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordUpdate {
    Status(Uuid),
    Temperature(Temperature),
    AssignedTo(Uuid),
    MarkComplete,
}

// ---------------------------------------------------------------------------
// tasks / notifications / board positions / activity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low"    => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high"   => Ok(Self::High),
            other    => Err(format!("unknown task priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub record_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    /// `None` leaves the task for external (e.g. round-robin) assignment.
    pub assigned_to_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub record_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub assigned_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub record_id: Uuid,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub record_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Placement of a record in a board column. Unique per `(record_id, column_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BoardPosition {
    pub tenant_id: Uuid,
    pub record_id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    #[sqlx(rename = "position")]
    pub order: i32,
}

/// Record-scoped activity feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub record_id: Uuid,
    pub kind: String,
    pub description: String,
    /// e.g. `"Automation: Hot lead follow-up"`.
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        tenant_id: Uuid,
        record_id: Uuid,
        kind: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            record_id,
            kind: kind.into(),
            description: description.into(),
            source: source.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// execution_logs / execution_steps
// ---------------------------------------------------------------------------

/// Status of a run. Moves from `Running` to a terminal state exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running"   => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown run status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started"   => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            "skipped"   => Ok(Self::Skipped),
            other       => Err(format!("unknown step status: {other}")),
        }
    }
}

/// One recorded event for a single node within a run.
///
/// A `Started` step always precedes the outcome step of the same node, but a
/// run that crashed mid-node leaves the `Started` step without a partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Monotonic position within the run, starting at 0.
    pub sequence: i32,
    pub node_id: String,
    pub node_kind: String,
    pub label: String,
    pub action_type: Option<String>,
    pub status: StepStatus,
    pub message: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The auditable log of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub automation_id: Uuid,
    pub record_id: Uuid,
    pub triggered_by: TriggerType,
    pub status: RunStatus,
    pub steps: Vec<Step>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionLog {
    /// A fresh log in `Running` state with no steps.
    pub fn start(
        id: Uuid,
        tenant_id: Uuid,
        automation_id: Uuid,
        record_id: Uuid,
        triggered_by: TriggerType,
    ) -> Self {
        Self {
            id,
            tenant_id,
            automation_id,
            record_id,
            triggered_by,
            status: RunStatus::Running,
            steps: Vec::new(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}
