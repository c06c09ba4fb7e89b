//! Per-run context shared by the engine and the action executor.

use std::collections::HashMap;

use db::models::TriggerType;
use serde_json::Value;
use uuid::Uuid;

/// Context of a single run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Tenant that owns the automation, the record and every row touched.
    pub tenant_id: Uuid,
    pub automation_id: Uuid,
    /// Used to tag activity entries with their source.
    pub automation_name: String,
    pub record_id: Uuid,
    /// ID of the execution log row for this run.
    pub log_id: Uuid,
    pub triggered_by: TriggerType,
    /// Reserved for values passed between nodes; nothing reads it yet.
    pub variables: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(
        tenant_id: Uuid,
        automation_id: Uuid,
        automation_name: impl Into<String>,
        record_id: Uuid,
        triggered_by: TriggerType,
    ) -> Self {
        Self {
            tenant_id,
            automation_id,
            automation_name: automation_name.into(),
            record_id,
            log_id: Uuid::new_v4(),
            triggered_by,
            variables: HashMap::new(),
        }
    }

    /// Source label written on activity entries, e.g. `"Automation: Welcome"`.
    pub fn activity_source(&self) -> String {
        format!("Automation: {}", self.automation_name)
    }
}
