//! Typed workflow graph.
//!
//! This is the shape of the JSONB `workflow` column of an automation. Node
//! kinds form a tagged union; presentation data the editor stores alongside
//! (positions, colours, …) is ignored on deserialization.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use db::models::{Automation, TriggerType};
use nodes::ActionConfig;

use crate::dag::validate_workflow;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Record field a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionField {
    Status,
    Temperature,
    IsComplete,
    HasTag,
    HasMotivation,
    IsAssigned,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    #[serde(other)]
    Unsupported,
}

/// How a condition combines with everything evaluated before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    /// Anything else behaves like `And`.
    #[serde(other)]
    Other,
}

/// A single predicate against the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Ignored on the first condition of a list.
    #[serde(default)]
    pub logic: Logic,
}

impl Condition {
    pub fn new(field: ConditionField, operator: ConditionOperator, value: impl Into<serde_json::Value>) -> Self {
        Self { field, operator, value: value.into(), logic: Logic::And }
    }

    pub fn or(mut self) -> Self {
        self.logic = Logic::Or;
        self
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// Name that marks a branch as the fallback of its branch group.
pub const FALLBACK_BRANCH_NAME: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// The single entry point of the graph.
    Trigger { trigger_type: TriggerType },
    Action { action: ActionConfig },
    /// Branch group: selects exactly one of the branch nodes it points to.
    Condition,
    /// One guarded outlet of a branch group.
    Branch {
        name: String,
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger { .. } => "trigger",
            Self::Action { .. } => "action",
            Self::Condition => "condition",
            Self::Branch { .. } => "branch",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self { id: id.into(), label: label.into(), kind }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { .. })
    }
}

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Which output of the source node this edge leaves from.
    #[serde(default)]
    pub source_handle: Option<String>,
}

impl WorkflowEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let (source, target) = (source.into(), target.into());
        Self { id: format!("{source}->{target}"), source, target, source_handle: None }
    }
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

impl WorkflowGraph {
    pub fn new(nodes: Vec<WorkflowNode>, edges: Vec<WorkflowEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Parse the payload stored on an automation.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, EngineError> {
        serde_json::from_value(value.clone()).map_err(|e| EngineError::InvalidWorkflow(e.to_string()))
    }

    pub fn trigger_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.iter().filter(|n| matches!(n.kind, NodeKind::Trigger { .. }))
    }

    /// The trigger node, if the graph has exactly one.
    pub fn single_trigger(&self) -> Option<&WorkflowNode> {
        let mut triggers = self.trigger_nodes();
        match (triggers.next(), triggers.next()) {
            (Some(trigger), None) => Some(trigger),
            _ => None,
        }
    }

    /// The trigger type of the single trigger node.
    pub fn trigger_type(&self) -> Option<TriggerType> {
        match self.single_trigger()?.kind {
            NodeKind::Trigger { trigger_type } => Some(trigger_type),
            _ => None,
        }
    }

    pub fn node_map(&self) -> HashMap<&str, &WorkflowNode> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    /// Outgoing edges per source node, in authored order.
    pub fn adjacency(&self) -> HashMap<&str, Vec<&WorkflowEdge>> {
        let mut adjacency: HashMap<&str, Vec<&WorkflowEdge>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.source.as_str()).or_default().push(edge);
        }
        adjacency
    }
}

/// Replace an automation's embedded graph in one step, after validating it.
///
/// # Errors
/// Any [`validate_workflow`] error; the automation is left untouched.
pub fn replace_workflow(automation: &mut Automation, graph: &WorkflowGraph) -> Result<(), EngineError> {
    validate_workflow(graph)?;
    let payload = serde_json::to_value(graph).map_err(|e| EngineError::InvalidWorkflow(e.to_string()))?;
    automation.workflow = Some(payload);
    automation.updated_at = Utc::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_editor_payload() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [
                { "id": "t", "type": "trigger", "label": "New lead", "trigger_type": "record_created",
                  "position": { "x": 10, "y": 20 } },
                { "id": "a", "type": "action", "label": "Done",
                  "action": { "action_type": "mark_complete" } },
                { "id": "c", "type": "condition", "label": "Route" },
                { "id": "b", "type": "branch", "label": "Hot", "name": "Hot",
                  "conditions": [ { "field": "temperature", "operator": "equals", "value": "hot" },
                                  { "field": "isComplete", "operator": "equals", "value": true, "logic": "OR" } ] },
                { "id": "n", "type": "sticky_note", "label": "remember" }
            ],
            "edges": [
                { "id": "e1", "source": "t", "target": "a" },
                { "id": "e2", "source": "c", "target": "b", "sourceHandle": "branch-0" }
            ]
        }))
        .unwrap();

        assert_eq!(graph.trigger_type(), Some(TriggerType::RecordCreated));
        assert_eq!(graph.nodes[1].kind, NodeKind::Action { action: ActionConfig::MarkComplete });
        assert_eq!(graph.nodes[2].kind, NodeKind::Condition);
        match &graph.nodes[3].kind {
            NodeKind::Branch { name, conditions } => {
                assert_eq!(name, "Hot");
                assert_eq!(conditions[0].logic, Logic::And);
                assert_eq!(conditions[1].logic, Logic::Or);
                assert_eq!(conditions[1].field, ConditionField::IsComplete);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(graph.nodes[4].kind, NodeKind::Unknown);
        assert_eq!(graph.edges[1].source_handle.as_deref(), Some("branch-0"));
    }

    #[test]
    fn unknown_logic_and_fields_degrade() {
        let condition: Condition = serde_json::from_value(json!({
            "field": "lastContactedAt", "operator": "before", "value": "2024-01-01", "logic": "XOR"
        }))
        .unwrap();
        assert_eq!(condition.field, ConditionField::Unsupported);
        assert_eq!(condition.operator, ConditionOperator::Unsupported);
        assert_eq!(condition.logic, Logic::Other);
    }

    #[test]
    fn single_trigger_requires_exactly_one() {
        let trigger = |id: &str| {
            WorkflowNode::new(id, "t", NodeKind::Trigger { trigger_type: TriggerType::TagAdded })
        };
        assert!(WorkflowGraph::new(vec![], vec![]).single_trigger().is_none());
        assert!(WorkflowGraph::new(vec![trigger("a")], vec![]).single_trigger().is_some());
        assert!(WorkflowGraph::new(vec![trigger("a"), trigger("b")], vec![]).single_trigger().is_none());
    }

    #[test]
    fn replace_workflow_only_accepts_valid_graphs() {
        let tenant = uuid::Uuid::new_v4();
        let mut automation = Automation::new(tenant, "Follow up", None);
        let trigger = WorkflowNode::new("t", "Start", NodeKind::Trigger { trigger_type: TriggerType::RecordCreated });
        let done = WorkflowNode::new("a", "Done", NodeKind::Action { action: ActionConfig::MarkComplete });

        let cyclic = WorkflowGraph::new(
            vec![trigger.clone(), done.clone()],
            vec![WorkflowEdge::new("t", "a"), WorkflowEdge::new("a", "t")],
        );
        assert!(matches!(replace_workflow(&mut automation, &cyclic), Err(EngineError::CycleDetected)));
        assert!(automation.workflow.is_none());

        let valid = WorkflowGraph::new(vec![trigger, done], vec![WorkflowEdge::new("t", "a")]);
        replace_workflow(&mut automation, &valid).unwrap();
        let stored = WorkflowGraph::from_value(automation.workflow.as_ref().unwrap()).unwrap();
        assert_eq!(stored, valid);
        assert_eq!(stored.trigger_type(), Some(TriggerType::RecordCreated));
    }
}
