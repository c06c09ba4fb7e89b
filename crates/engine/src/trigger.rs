//! Trigger matching: which automations should run for an emitted event.

use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use db::models::{Automation, TriggerType};
use db::Store;

use crate::models::WorkflowGraph;
use crate::EngineError;

#[derive(Clone)]
pub struct TriggerMatcher {
    store: Arc<dyn Store>,
}

impl TriggerMatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Active automations of `tenant_id` whose single trigger node has type
    /// `trigger_type`.
    ///
    /// Automations without a workflow, with an unparseable workflow, or
    /// without exactly one trigger node are left out silently.
    #[instrument(skip(self))]
    pub async fn find_matching(
        &self,
        trigger_type: TriggerType,
        tenant_id: Uuid,
    ) -> Result<Vec<Automation>, EngineError> {
        let candidates = self.store.list_active_automations(tenant_id).await?;

        let matching: Vec<Automation> = candidates
            .into_iter()
            .filter(|a| a.is_active && a.tenant_id == tenant_id)
            .filter(|a| {
                let Some(payload) = a.workflow.as_ref() else {
                    return false;
                };
                match WorkflowGraph::from_value(payload) {
                    Ok(graph) => graph.trigger_type() == Some(trigger_type),
                    Err(e) => {
                        debug!(automation_id = %a.id, error = %e, "unparseable workflow ignored");
                        false
                    }
                }
            })
            .collect();

        debug!(count = matching.len(), "matching automations");
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::memory::MemoryStore;
    use serde_json::json;

    fn workflow(trigger_type: &str) -> serde_json::Value {
        json!({
            "nodes": [ { "id": "t", "type": "trigger", "label": "Start", "trigger_type": trigger_type } ],
            "edges": []
        })
    }

    #[tokio::test]
    async fn matches_on_type_tenant_and_active_flag() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();

        let wanted = Automation::new(tenant, "wanted", Some(workflow("status_changed")));
        let other_type = Automation::new(tenant, "other type", Some(workflow("tag_added")));
        let mut inactive = Automation::new(tenant, "inactive", Some(workflow("status_changed")));
        inactive.is_active = false;
        let other_tenant = Automation::new(Uuid::new_v4(), "other tenant", Some(workflow("status_changed")));
        let no_workflow = Automation::new(tenant, "empty", None);
        let no_trigger = Automation::new(tenant, "no trigger", Some(json!({ "nodes": [], "edges": [] })));
        let garbage = Automation::new(tenant, "garbage", Some(json!({ "nodes": "nope" })));

        let wanted_id = wanted.id;
        for a in [wanted, other_type, inactive, other_tenant, no_workflow, no_trigger, garbage] {
            store.insert_automation(a);
        }

        let matcher = TriggerMatcher::new(store);
        let found = matcher.find_matching(TriggerType::StatusChanged, tenant).await.unwrap();
        assert_eq!(found.iter().map(|a| a.id).collect::<Vec<_>>(), vec![wanted_id]);
    }
}
