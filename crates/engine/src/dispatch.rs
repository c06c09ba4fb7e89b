//! Event dispatch: match automations and launch one run per match.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use uuid::Uuid;

use db::models::{Automation, TriggerType};
use db::Store;

use crate::executor::{ExecutorConfig, RunOutcome, WorkflowExecutor};
use crate::trigger::TriggerMatcher;
use crate::EngineError;

/// A business event emitted by the CRM for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub tenant_id: Uuid,
    pub record_id: Uuid,
    pub trigger_type: TriggerType,
}

/// Entry point for CRM mutation handlers.
#[derive(Clone)]
pub struct AutomationEngine {
    matcher: TriggerMatcher,
    executor: Arc<WorkflowExecutor>,
}

impl AutomationEngine {
    pub fn new(store: Arc<dyn Store>, config: ExecutorConfig) -> Self {
        Self {
            matcher: TriggerMatcher::new(store.clone()),
            executor: Arc::new(WorkflowExecutor::new(store, config)),
        }
    }

    pub async fn find_matching(&self, trigger_type: TriggerType, tenant_id: Uuid) -> Result<Vec<Automation>, EngineError> {
        self.matcher.find_matching(trigger_type, tenant_id).await
    }

    pub async fn execute(
        &self,
        tenant_id: Uuid,
        automation_id: Uuid,
        record_id: Uuid,
        triggered_by: TriggerType,
    ) -> Option<RunOutcome> {
        self.executor.execute(tenant_id, automation_id, record_id, triggered_by).await
    }

    /// Spawn one run per matching automation and return immediately.
    ///
    /// Callers may drop the handles (fire-and-forget); run failures are only
    /// visible in the execution logs. A failed lookup spawns nothing and is
    /// logged, never returned, so the triggering operation is never blocked.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, event: TriggerEvent) -> Vec<JoinHandle<Option<RunOutcome>>> {
        let matching = match self.matcher.find_matching(event.trigger_type, event.tenant_id).await {
            Ok(matching) => matching,
            Err(e) => {
                error!(error = %e, "could not look up automations for event");
                return Vec::new();
            }
        };
        info!(count = matching.len(), "dispatching automation runs");

        matching
            .into_iter()
            .map(|automation| {
                let executor = self.executor.clone();
                tokio::spawn(async move {
                    executor
                        .execute(event.tenant_id, automation.id, event.record_id, event.trigger_type)
                        .await
                })
            })
            .collect()
    }
}
