//! Workflow execution engine.
//!
//! `WorkflowExecutor` runs one automation against one record:
//! 1. Loads the automation and parses its graph; inactive or empty
//!    automations are a no-op.
//! 2. Opens an execution log in `running` status.
//! 3. Walks the graph depth-first from the single trigger node with an
//!    explicit work-list, recording a `started` step before every node and
//!    an outcome step after it.
//! 4. Action nodes go through `ActionExecutor`; branch groups select exactly
//!    one branch via `ConditionEvaluator`; every other node fans out to all
//!    of its successors, one after another.
//! 5. Closes the log as `completed` (and bumps run stats) or `failed`.
//!
//! Already-applied actions are never rolled back when a later node fails.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use db::models::{Automation, ExecutionLog, RunStatus, Step, StepStatus, TriggerType};
use db::Store;
use nodes::{ActionConfig, ActionExecutor, ActionOutcome, ExecutionContext};

use crate::condition::ConditionEvaluator;
use crate::locks::RecordLocks;
use crate::models::{NodeKind, WorkflowEdge, WorkflowGraph, WorkflowNode, FALLBACK_BRANCH_NAME};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Serialize runs that target the same record (per-record advisory lock).
    pub serialize_record_runs: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { serialize_record_runs: true }
    }
}

// ---------------------------------------------------------------------------
// Output of a run
// ---------------------------------------------------------------------------

/// How a run that produced an execution log ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub log_id: Uuid,
    pub status: RunStatus,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Step recording
// ---------------------------------------------------------------------------

/// Appends steps to one run's log with a monotonic sequence number.
struct StepRecorder<'a> {
    store: &'a dyn Store,
    tenant_id: Uuid,
    log_id: Uuid,
    next_sequence: i32,
}

impl<'a> StepRecorder<'a> {
    fn new(store: &'a dyn Store, ctx: &ExecutionContext) -> Self {
        Self { store, tenant_id: ctx.tenant_id, log_id: ctx.log_id, next_sequence: 0 }
    }

    /// Record the `started` step of `node` and return its start time.
    async fn started(&mut self, node: &WorkflowNode) -> Result<DateTime<Utc>, EngineError> {
        let now = Utc::now();
        self.push(node, StepStatus::Started, format!("Executing {}", node.kind.as_str()), None, None, now, None)
            .await?;
        Ok(now)
    }

    #[allow(clippy::too_many_arguments)]
    async fn push(
        &mut self,
        node: &WorkflowNode,
        status: StepStatus,
        message: String,
        result: Option<String>,
        error: Option<String>,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        let step = Step {
            sequence: self.next_sequence,
            node_id: node.id.clone(),
            node_kind: node.kind.as_str().to_string(),
            label: node.label.clone(),
            action_type: match &node.kind {
                NodeKind::Action { action } => Some(action.action_type().to_string()),
                _ => None,
            },
            status,
            message,
            result,
            error,
            started_at,
            completed_at,
        };
        self.store.append_step(self.tenant_id, self.log_id, &step).await?;
        self.next_sequence += 1;
        Ok(())
    }

    async fn finished(
        &mut self,
        node: &WorkflowNode,
        status: StepStatus,
        message: String,
        result: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.push(node, status, message, result, None, started_at, Some(Utc::now())).await
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Runs automations against records.
///
/// Construct one executor per process and share it (it is cheap to wrap in
/// an `Arc`); concurrent runs are independent apart from the per-record lock.
pub struct WorkflowExecutor {
    store: Arc<dyn Store>,
    actions: ActionExecutor,
    conditions: ConditionEvaluator,
    locks: RecordLocks,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(store: Arc<dyn Store>, config: ExecutorConfig) -> Self {
        Self {
            actions: ActionExecutor::new(store.clone()),
            conditions: ConditionEvaluator::new(store.clone()),
            locks: RecordLocks::new(),
            store,
            config,
        }
    }

    /// Run `automation_id` against `record_id`.
    ///
    /// Never fails: problems end up in the execution log (and in tracing
    /// output). Returns `None` when no run was started (missing, inactive or
    /// empty automation) or when the log itself could not be written.
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        automation_id: Uuid,
        record_id: Uuid,
        triggered_by: TriggerType,
    ) -> Option<RunOutcome> {
        match self.try_execute(tenant_id, automation_id, record_id, triggered_by).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "automation run could not be recorded");
                None
            }
        }
    }

    async fn try_execute(
        &self,
        tenant_id: Uuid,
        automation_id: Uuid,
        record_id: Uuid,
        triggered_by: TriggerType,
    ) -> Result<Option<RunOutcome>, EngineError> {
        let Some(automation) = self.store.get_automation(tenant_id, automation_id).await? else {
            info!("automation not found; nothing to run");
            return Ok(None);
        };
        if !automation.is_active {
            info!("automation inactive; nothing to run");
            return Ok(None);
        }
        let Some(payload) = automation.workflow.as_ref() else {
            info!("automation has no workflow; nothing to run");
            return Ok(None);
        };
        let graph = WorkflowGraph::from_value(payload);
        if matches!(&graph, Ok(g) if g.nodes.is_empty()) {
            info!("workflow has no nodes; nothing to run");
            return Ok(None);
        }

        let _guard = if self.config.serialize_record_runs {
            Some(self.locks.acquire(tenant_id, record_id).await)
        } else {
            None
        };

        let ctx = ExecutionContext::new(tenant_id, automation_id, &automation.name, record_id, triggered_by);
        let log = ExecutionLog::start(ctx.log_id, tenant_id, automation_id, record_id, triggered_by);
        self.store.create_execution_log(&log).await?;
        info!(log_id = %ctx.log_id, "automation run started");

        let result = match graph {
            Ok(graph) => self.walk(&graph, &ctx).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(()) => {
                self.store
                    .finish_execution_log(tenant_id, ctx.log_id, RunStatus::Completed, None, Utc::now())
                    .await?;
                self.update_run_stats(&automation).await?;
                info!(log_id = %ctx.log_id, "automation run completed");
                RunOutcome { log_id: ctx.log_id, status: RunStatus::Completed, error: None }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(log_id = %ctx.log_id, error = %message, "automation run failed");
                self.store
                    .finish_execution_log(tenant_id, ctx.log_id, RunStatus::Failed, Some(message.clone()), Utc::now())
                    .await?;
                RunOutcome { log_id: ctx.log_id, status: RunStatus::Failed, error: Some(message) }
            }
        };

        Ok(Some(outcome))
    }

    /// Increment the automation's run counter. Only called for full success.
    async fn update_run_stats(&self, automation: &Automation) -> Result<(), EngineError> {
        self.store
            .record_successful_run(automation.tenant_id, automation.id, Utc::now())
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Graph walk
    // -----------------------------------------------------------------------

    async fn walk(&self, graph: &WorkflowGraph, ctx: &ExecutionContext) -> Result<(), EngineError> {
        let trigger = graph.single_trigger().ok_or(EngineError::NoTrigger)?;
        let node_map = graph.node_map();
        let adjacency = graph.adjacency();
        let mut recorder = StepRecorder::new(self.store.as_ref(), ctx);

        let mut stack: Vec<&str> = vec![trigger.id.as_str()];
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                warn!(node_id, "node reached again in the same run; not re-executed");
                continue;
            }
            let Some(node) = node_map.get(node_id).copied() else {
                warn!(node_id, "edge points at a missing node; skipped");
                continue;
            };

            let outgoing: &[&WorkflowEdge] = adjacency.get(node_id).map(Vec::as_slice).unwrap_or_default();
            let next = self.visit(node, outgoing, &node_map, ctx, &mut recorder).await?;

            // Reverse so the first authored edge is explored first.
            stack.extend(next.into_iter().rev());
        }

        Ok(())
    }

    /// Execute one node and return the successors to visit, in order.
    async fn visit<'g>(
        &self,
        node: &'g WorkflowNode,
        outgoing: &[&'g WorkflowEdge],
        node_map: &HashMap<&str, &'g WorkflowNode>,
        ctx: &ExecutionContext,
        recorder: &mut StepRecorder<'_>,
    ) -> Result<Vec<&'g str>, EngineError> {
        let started_at = recorder.started(node).await?;
        let all_targets = || outgoing.iter().map(|e| e.target.as_str()).collect::<Vec<_>>();

        match &node.kind {
            NodeKind::Trigger { trigger_type } => {
                let message = format!("Triggered by {}", ctx.triggered_by);
                recorder
                    .finished(node, StepStatus::Completed, message, Some(trigger_type.to_string()), started_at)
                    .await?;
                Ok(all_targets())
            }

            NodeKind::Action { action } => {
                self.run_action(node, action, ctx, recorder, started_at).await?;
                Ok(all_targets())
            }

            NodeKind::Condition => {
                let chosen = self.select_branch(outgoing, node_map, ctx).await;
                let result = match chosen {
                    Some((_, name)) => format!("Branch: {name}"),
                    None => "No match".to_string(),
                };
                recorder
                    .finished(node, StepStatus::Completed, "Evaluated branches".into(), Some(result), started_at)
                    .await?;
                Ok(chosen.map(|(id, _)| vec![id]).unwrap_or_default())
            }

            NodeKind::Branch { name, .. } => {
                recorder
                    .finished(node, StepStatus::Completed, format!("Entered branch {name}"), None, started_at)
                    .await?;
                Ok(all_targets())
            }

            NodeKind::Unknown => {
                warn!(node_id = %node.id, "unrecognized node kind; skipped");
                recorder
                    .finished(node, StepStatus::Skipped, "Unrecognized node kind".into(), None, started_at)
                    .await?;
                Ok(all_targets())
            }
        }
    }

    async fn run_action(
        &self,
        node: &WorkflowNode,
        action: &ActionConfig,
        ctx: &ExecutionContext,
        recorder: &mut StepRecorder<'_>,
        started_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        match self.actions.apply(action, ctx).await {
            Ok(ActionOutcome::Applied(message)) => {
                recorder.finished(node, StepStatus::Completed, message, None, started_at).await
            }
            Ok(ActionOutcome::Skipped(message)) => {
                recorder.finished(node, StepStatus::Skipped, message, None, started_at).await
            }
            Err(source) => {
                recorder
                    .push(
                        node,
                        StepStatus::Failed,
                        "Action failed".into(),
                        None,
                        Some(source.to_string()),
                        started_at,
                        Some(Utc::now()),
                    )
                    .await?;
                Err(EngineError::ActionFailed { label: node.label.clone(), source })
            }
        }
    }

    /// Pick the branch a branch group continues into.
    ///
    /// Conditioned branches are tried in authored edge order and the first
    /// match wins; otherwise the fallback branch (no conditions, or named
    /// `"None"`) is taken if there is one.
    async fn select_branch<'g>(
        &self,
        outgoing: &[&'g WorkflowEdge],
        node_map: &HashMap<&str, &'g WorkflowNode>,
        ctx: &ExecutionContext,
    ) -> Option<(&'g str, &'g str)> {
        let mut fallback = None;
        let mut guarded = Vec::new();

        for edge in outgoing {
            let Some(target) = node_map.get(edge.target.as_str()).copied() else {
                continue;
            };
            let NodeKind::Branch { name, conditions } = &target.kind else {
                continue;
            };
            if conditions.is_empty() || name == FALLBACK_BRANCH_NAME {
                fallback.get_or_insert((target.id.as_str(), name.as_str()));
            } else {
                guarded.push((target.id.as_str(), name.as_str(), conditions));
            }
        }

        for (id, name, conditions) in guarded {
            if self.conditions.evaluate_branch(conditions, ctx).await {
                return Some((id, name));
            }
        }
        fallback
    }
}
