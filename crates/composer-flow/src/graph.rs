use std::collections::{HashMap, HashSet};

use crate::edge::Edge;
use crate::node::Node;

/// Incoming-edge index of a flow, for lookups while it runs.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// node_id -> edges entering it, in flow order.
  incoming: HashMap<String, Vec<Edge>>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  pub fn new(nodes: &[Node], edges: &[Edge]) -> Self {
    let mut incoming: HashMap<String, Vec<Edge>> = HashMap::with_capacity(nodes.len());
    for node in nodes {
      incoming.entry(node.id.clone()).or_default();
    }
    for edge in edges {
      incoming
        .entry(edge.target.clone())
        .or_default()
        .push(edge.clone());
    }

    Self { incoming }
  }

  /// Edges whose target is the given node.
  pub fn incoming(&self, node_id: &str) -> &[Edge] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Distinct upstream node ids, in edge order.
  pub fn upstream(&self, node_id: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    self
      .incoming(node_id)
      .iter()
      .map(|e| e.source.as_str())
      .filter(|id| seen.insert(*id))
      .collect()
  }
}
