//! Workflow validation: run this before persisting a workflow.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs (both `source` and `target`).
//! 3. There must be exactly one trigger node.
//! 4. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns a topologically-sorted list of node IDs on success.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::WorkflowGraph;
use crate::EngineError;

/// Validate the workflow graph and return its nodes in topological order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::TriggerCount`] unless there is exactly one trigger.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_workflow(graph: &WorkflowGraph) -> Result<Vec<String>, EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &graph.edges {
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    let triggers = graph.trigger_nodes().count();
    if triggers != 1 {
        return Err(EngineError::TriggerCount(triggers));
    }

    // Kahn's algorithm.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &graph.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for edge in &graph.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    // Seed in authored order so the result is deterministic.
    let mut queue: VecDeque<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(graph.nodes.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    if sorted.len() != graph.nodes.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeKind, WorkflowEdge, WorkflowNode};
    use db::models::TriggerType;
    use nodes::ActionConfig;

    fn trigger(id: &str) -> WorkflowNode {
        WorkflowNode::new(id, id, NodeKind::Trigger { trigger_type: TriggerType::RecordCreated })
    }

    fn action(id: &str) -> WorkflowNode {
        WorkflowNode::new(id, id, NodeKind::Action { action: ActionConfig::MarkComplete })
    }

    fn edge(from: &str, to: &str) -> WorkflowEdge {
        WorkflowEdge::new(from, to)
    }

    #[test]
    fn valid_linear_graph_returns_sorted_order() {
        let graph = WorkflowGraph::new(
            vec![trigger("t"), action("a"), action("b")],
            vec![edge("t", "a"), edge("a", "b")],
        );
        assert_eq!(validate_workflow(&graph).unwrap(), vec!["t", "a", "b"]);
    }

    #[test]
    fn valid_diamond_graph() {
        let graph = WorkflowGraph::new(
            vec![trigger("t"), action("b"), action("c"), action("d")],
            vec![edge("t", "b"), edge("t", "c"), edge("b", "d"), edge("c", "d")],
        );
        let sorted = validate_workflow(&graph).unwrap();
        assert_eq!(sorted.first().map(String::as_str), Some("t"));
        assert_eq!(sorted.last().map(String::as_str), Some("d"));
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let graph = WorkflowGraph::new(vec![trigger("t"), action("a"), action("a")], vec![]);
        assert!(matches!(
            validate_workflow(&graph),
            Err(EngineError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let graph = WorkflowGraph::new(vec![trigger("t")], vec![edge("t", "ghost")]);
        assert!(matches!(
            validate_workflow(&graph),
            Err(EngineError::UnknownNodeReference { node_id, side: "target" }) if node_id == "ghost"
        ));
    }

    #[test]
    fn trigger_count_must_be_one() {
        let none = WorkflowGraph::new(vec![action("a")], vec![]);
        assert!(matches!(validate_workflow(&none), Err(EngineError::TriggerCount(0))));

        let two = WorkflowGraph::new(vec![trigger("t1"), trigger("t2")], vec![]);
        assert!(matches!(validate_workflow(&two), Err(EngineError::TriggerCount(2))));
    }

    #[test]
    fn cycle_is_detected() {
        let graph = WorkflowGraph::new(
            vec![trigger("t"), action("a"), action("b")],
            vec![edge("t", "a"), edge("a", "b"), edge("b", "a")],
        );
        assert!(matches!(validate_workflow(&graph), Err(EngineError::CycleDetected)));
    }
}
