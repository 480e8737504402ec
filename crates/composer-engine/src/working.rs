//! The run's private working copy of a flow.
//!
//! Each update produces a new [`FlowSnapshot`] version. Nodes are held as
//! `Arc<Node>` so a new version only allocates the node that changed; every
//! other entry is shared with the previous version.

use std::sync::{Arc, Mutex};

use composer_flow::{Edge, Flow, Node};

/// An immutable version of a flow's nodes and edges.
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
  version: u64,
  nodes: Arc<Vec<Arc<Node>>>,
  edges: Arc<Vec<Edge>>,
}

impl FlowSnapshot {
  pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
    Self {
      version: 0,
      nodes: Arc::new(nodes.into_iter().map(Arc::new).collect()),
      edges: Arc::new(edges),
    }
  }

  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn nodes(&self) -> &[Arc<Node>] {
    &self.nodes
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn node(&self, node_id: &str) -> Option<&Arc<Node>> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// Next version with `update` applied to one node.
  ///
  /// Returns `self` unchanged (same version) when the node is unknown.
  fn apply(&self, node_id: &str, update: impl Fn(&Node) -> Node) -> FlowSnapshot {
    let Some(index) = self.nodes.iter().position(|n| n.id == node_id) else {
      return self.clone();
    };

    let mut nodes: Vec<Arc<Node>> = self.nodes.iter().cloned().collect();
    nodes[index] = Arc::new(update(&nodes[index]));

    FlowSnapshot {
      version: self.version + 1,
      nodes: Arc::new(nodes),
      edges: self.edges.clone(),
    }
  }

  /// Next version with `update` applied to every node.
  fn apply_all(&self, update: impl Fn(&Node) -> Node) -> FlowSnapshot {
    FlowSnapshot {
      version: self.version + 1,
      nodes: Arc::new(self.nodes.iter().map(|n| Arc::new(update(n))).collect()),
      edges: self.edges.clone(),
    }
  }

  /// Owned flow document for persistence.
  pub fn to_flow(&self) -> Flow {
    Flow::new(
      self.nodes.iter().map(|n| Node::clone(n)).collect(),
      self.edges.to_vec(),
    )
  }
}

/// Holder of the current [`FlowSnapshot`] for one run.
///
/// Sibling nodes of a level settle concurrently, so the current version sits
/// behind a lock that is never held across an await.
#[derive(Debug)]
pub struct WorkingCopy {
  current: Mutex<FlowSnapshot>,
}

impl WorkingCopy {
  pub fn new(snapshot: FlowSnapshot) -> Self {
    Self {
      current: Mutex::new(snapshot),
    }
  }

  /// The current version.
  pub fn snapshot(&self) -> FlowSnapshot {
    self
      .current
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  /// Update one node and return the new version number.
  pub fn update(&self, node_id: &str, update: impl Fn(&Node) -> Node) -> u64 {
    let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
    *current = current.apply(node_id, update);
    current.version
  }

  /// Update every node and return the new version number.
  pub fn update_all(&self, update: impl Fn(&Node) -> Node) -> u64 {
    let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
    *current = current.apply_all(update);
    current.version
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use composer_flow::{NodeKind, NodeStatus, PrimitiveData};

  fn node(id: &str) -> Node {
    Node::new(id, NodeKind::Primitive(PrimitiveData::default()))
  }

  fn running(n: &Node) -> Node {
    n.with_status(NodeStatus {
      running: true,
      ..n.status.clone()
    })
  }

  #[test]
  fn test_update_shares_untouched_nodes() {
    let copy = WorkingCopy::new(FlowSnapshot::new(vec![node("a"), node("b")], vec![]));
    let before = copy.snapshot();

    let version = copy.update("a", running);
    let after = copy.snapshot();

    assert_eq!(version, 1);
    assert!(after.node("a").unwrap().status.running);
    assert!(Arc::ptr_eq(&before.nodes()[1], &after.nodes()[1]));
    // Older versions are never modified.
    assert!(!before.node("a").unwrap().status.running);
    assert_eq!(before.version(), 0);
  }

  #[test]
  fn test_unknown_node_keeps_version() {
    let copy = WorkingCopy::new(FlowSnapshot::new(vec![node("a")], vec![]));
    assert_eq!(copy.update("ghost", running), 0);
  }

  #[test]
  fn test_update_all() {
    let copy = WorkingCopy::new(FlowSnapshot::new(vec![node("a"), node("b")], vec![]));
    copy.update_all(running);

    let flow = copy.snapshot().to_flow();
    assert!(flow.nodes.iter().all(|n| n.status.running));
  }
}
