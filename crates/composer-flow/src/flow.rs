use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::FlowError;
use crate::graph::Graph;
use crate::level::levels;
use crate::node::Node;

/// Editor viewport, persisted alongside the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
  pub x: f64,
  pub y: f64,
  pub zoom: f64,
}

/// A persisted flow document: `{ nodes, edges, viewport?, meta? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  #[serde(default)]
  pub nodes: Vec<Node>,
  #[serde(default)]
  pub edges: Vec<Edge>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub viewport: Option<Viewport>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<serde_json::Value>,
}

impl Flow {
  pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
    Self {
      nodes,
      edges,
      viewport: None,
      meta: None,
    }
  }

  /// Parse a flow document from JSON.
  pub fn from_json(json: &str) -> Result<Self, FlowError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes, &self.edges)
  }

  /// Dependency levels of this flow. See [`levels`].
  pub fn levels(&self) -> Vec<Vec<&Node>> {
    levels(&self.nodes, &self.edges)
  }

  /// Add an edge, evicting any edge that already fills the same input slot.
  ///
  /// Returns the evicted edge, if any.
  pub fn connect(&mut self, edge: Edge) -> Option<Edge> {
    let evicted = self
      .edges
      .iter()
      .position(|e| e.occupies_same_slot(&edge))
      .map(|i| self.edges.remove(i));
    self.edges.push(edge);
    evicted
  }

  /// Check the flow is well formed: unique node ids, every edge endpoint
  /// exists, and no cycles.
  ///
  /// Execution does not require this; it silently skips nodes the leveler
  /// cannot reach.
  pub fn validate(&self) -> Result<(), FlowError> {
    let mut ids = HashSet::new();
    for node in &self.nodes {
      if !ids.insert(node.id.as_str()) {
        return Err(FlowError::DuplicateNode(node.id.clone()));
      }
    }

    for edge in &self.edges {
      for endpoint in [&edge.source, &edge.target] {
        if !ids.contains(endpoint.as_str()) {
          return Err(FlowError::DanglingEdge {
            edge_id: edge.id.clone(),
            node_id: endpoint.clone(),
          });
        }
      }
    }

    let leveled: HashSet<&str> = self
      .levels()
      .into_iter()
      .flatten()
      .map(|n| n.id.as_str())
      .collect();
    let stuck: Vec<String> = self
      .nodes
      .iter()
      .filter(|n| !leveled.contains(n.id.as_str()))
      .map(|n| n.id.clone())
      .collect();

    if stuck.is_empty() {
      Ok(())
    } else {
      Err(FlowError::Cycle { nodes: stuck })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::{NodeKind, PrimitiveData, ResultData};

  fn primitive(id: &str) -> Node {
    Node::new(id, NodeKind::Primitive(PrimitiveData::default()))
  }

  fn result(id: &str) -> Node {
    Node::new(id, NodeKind::Result(ResultData::default()))
  }

  #[test]
  fn test_connect_evicts_same_slot() {
    let mut flow = Flow::new(vec![primitive("a"), primitive("b"), result("r")], vec![]);

    assert!(flow.connect(Edge::new("e1", "a", "r")).is_none());
    let evicted = flow.connect(Edge::new("e2", "b", "r"));

    assert_eq!(evicted.map(|e| e.id), Some("e1".to_string()));
    assert_eq!(flow.edges.len(), 1);
    assert_eq!(flow.edges[0].source, "b");
  }

  #[test]
  fn test_connect_different_handles_coexist() {
    let mut flow = Flow::new(vec![primitive("a"), primitive("b"), result("r")], vec![]);

    flow.connect(Edge::new("e1", "a", "r").with_target_handle("video"));
    let evicted = flow.connect(Edge::new("e2", "b", "r").with_target_handle("audio"));

    assert!(evicted.is_none());
    assert_eq!(flow.edges.len(), 2);
  }

  #[test]
  fn test_validate_reports_cycle_members() {
    let flow = Flow::new(
      vec![primitive("a"), result("b"), result("c")],
      vec![
        Edge::new("e1", "a", "b"),
        Edge::new("e2", "b", "c"),
        Edge::new("e3", "c", "b"),
      ],
    );

    match flow.validate() {
      Err(FlowError::Cycle { nodes }) => assert_eq!(nodes, vec!["b", "c"]),
      other => panic!("expected cycle error, got {:?}", other),
    }
  }

  #[test]
  fn test_validate_reports_dangling_edge() {
    let flow = Flow::new(vec![primitive("a")], vec![Edge::new("e1", "a", "ghost")]);

    assert!(matches!(
      flow.validate(),
      Err(FlowError::DanglingEdge { node_id, .. }) if node_id == "ghost"
    ));
  }

  #[test]
  fn test_validate_rejects_duplicate_ids() {
    let flow = Flow::new(vec![primitive("a"), primitive("a")], vec![]);

    assert!(matches!(flow.validate(), Err(FlowError::DuplicateNode(id)) if id == "a"));
  }

  #[test]
  fn test_from_json_document() {
    let flow = Flow::from_json(
      r#"{
        "nodes": [
          { "id": "p", "type": "primitive", "position": { "x": 0, "y": 0 }, "data": { "value": "hi" } },
          { "id": "r", "type": "result", "position": { "x": 200, "y": 0 }, "data": {} }
        ],
        "edges": [
          { "id": "e1", "source": "p", "target": "r", "targetHandle": "input" }
        ],
        "viewport": { "x": 0, "y": 0, "zoom": 1.5 }
      }"#,
    )
    .unwrap();

    assert_eq!(flow.nodes.len(), 2);
    assert_eq!(flow.edges[0].slot(), "input");
    assert_eq!(flow.viewport.map(|v| v.zoom), Some(1.5));
    assert!(flow.validate().is_ok());
    assert!(flow.get_node("r").is_some());
  }
}
