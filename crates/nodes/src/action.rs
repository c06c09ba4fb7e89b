//! The fixed catalog of actions an action node can perform.

use std::fmt;

use db::models::{TaskPriority, Temperature};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration of an action node, tagged by `action_type`.
///
/// Unrecognised action types deserialize to [`ActionConfig::Unknown`] and
/// are skipped at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionConfig {
    UpdateStatus {
        status_id: Uuid,
    },
    UpdateTemperature {
        temperature: Temperature,
    },
    AddTag {
        tag_id: Uuid,
    },
    RemoveTag {
        tag_id: Uuid,
    },
    AssignUser {
        user_id: Uuid,
    },
    MarkComplete,
    AddToBoard {
        board_id: Uuid,
        column_id: Uuid,
    },
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        priority: TaskPriority,
        /// Due date relative to the moment the action runs.
        #[serde(default)]
        due_in_days: Option<u32>,
        #[serde(default)]
        assignment: TaskAssignment,
    },
    SendNotification {
        user_id: Uuid,
        title: String,
        message: String,
    },
    /// Delays are not supported; the node is recorded as skipped.
    Wait {
        duration: u32,
        unit: WaitUnit,
    },
    #[serde(other)]
    Unknown,
}

impl ActionConfig {
    /// The `action_type` tag, as written in step logs.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::UpdateStatus { .. } => "update_status",
            Self::UpdateTemperature { .. } => "update_temperature",
            Self::AddTag { .. } => "add_tag",
            Self::RemoveTag { .. } => "remove_tag",
            Self::AssignUser { .. } => "assign_user",
            Self::MarkComplete => "mark_complete",
            Self::AddToBoard { .. } => "add_to_board",
            Self::CreateTask { .. } => "create_task",
            Self::SendNotification { .. } => "send_notification",
            Self::Wait { .. } => "wait",
            Self::Unknown => "unknown",
        }
    }
}

/// Who a task created by an automation is assigned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TaskAssignment {
    User { user_id: Uuid },
    /// Whoever the record is assigned to when the action runs.
    RecordAssignee,
    /// Left unassigned here; distribution happens outside the engine.
    RoundRobin,
    #[default]
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUnit {
    Minutes,
    Hours,
    Days,
}

impl fmt::Display for WaitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        })
    }
}
