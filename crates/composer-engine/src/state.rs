//! Access to the UI-owned node collection.
//!
//! The engine never holds on to shared state. It reads a snapshot when a run
//! starts and afterwards only sends pure updates, each applied by the owner
//! to whatever the collection holds at that moment.

use std::sync::RwLock;

use composer_flow::{Edge, Flow, Node};

/// A pure update of the node collection.
pub type NodesUpdate<'a> = &'a (dyn Fn(&[Node]) -> Vec<Node> + Sync);

/// State accessor for the flow currently open in the UI.
pub trait FlowState: Send + Sync {
  /// Current nodes of the open flow.
  fn nodes(&self) -> Vec<Node>;

  /// Current edges of the open flow.
  fn edges(&self) -> Vec<Edge>;

  /// Id of the flow the UI is showing, if any.
  fn active_flow_id(&self) -> Option<String>;

  /// Replace the node collection with `update(current)`.
  fn update_nodes(&self, update: NodesUpdate<'_>);

  /// Nodes and edges of `flow_id`, or `None` when another flow (or none) is
  /// open. Implementations that can read under one lock should override this.
  fn snapshot(&self, flow_id: &str) -> Option<(Vec<Node>, Vec<Edge>)> {
    if self.active_flow_id().as_deref() != Some(flow_id) {
      return None;
    }
    Some((self.nodes(), self.edges()))
  }

  /// Apply `update` only while `flow_id` is the open flow.
  ///
  /// Returns whether the update was applied. Implementations that can check
  /// and write under one lock should override this.
  fn update_if_active(&self, flow_id: &str, update: NodesUpdate<'_>) -> bool {
    if self.active_flow_id().as_deref() != Some(flow_id) {
      return false;
    }
    self.update_nodes(update);
    true
  }
}

#[derive(Debug, Default)]
struct Open {
  flow_id: Option<String>,
  flow: Flow,
}

/// In-process [`FlowState`]: one open flow behind a lock.
#[derive(Debug, Default)]
pub struct SharedFlowState {
  inner: RwLock<Open>,
}

impl SharedFlowState {
  pub fn new() -> Self {
    Self::default()
  }

  /// A state with `flow` open under `flow_id`.
  pub fn with_open(flow_id: impl Into<String>, flow: Flow) -> Self {
    let state = Self::new();
    state.open(flow_id, flow);
    state
  }

  /// Switch the UI to another flow.
  pub fn open(&self, flow_id: impl Into<String>, flow: Flow) {
    let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
    inner.flow_id = Some(flow_id.into());
    inner.flow = flow;
  }

  /// Close whatever flow is open.
  pub fn close(&self) {
    let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
    inner.flow_id = None;
    inner.flow = Flow::default();
  }

  /// Copy of the open flow.
  pub fn flow(&self) -> Flow {
    self
      .inner
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .flow
      .clone()
  }
}

impl FlowState for SharedFlowState {
  fn nodes(&self) -> Vec<Node> {
    self
      .inner
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .flow
      .nodes
      .clone()
  }

  fn edges(&self) -> Vec<Edge> {
    self
      .inner
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .flow
      .edges
      .clone()
  }

  fn active_flow_id(&self) -> Option<String> {
    self
      .inner
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .flow_id
      .clone()
  }

  fn snapshot(&self, flow_id: &str) -> Option<(Vec<Node>, Vec<Edge>)> {
    let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
    if inner.flow_id.as_deref() != Some(flow_id) {
      return None;
    }
    Some((inner.flow.nodes.clone(), inner.flow.edges.clone()))
  }

  fn update_nodes(&self, update: NodesUpdate<'_>) {
    let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
    inner.flow.nodes = update(&inner.flow.nodes);
  }

  fn update_if_active(&self, flow_id: &str, update: NodesUpdate<'_>) -> bool {
    let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
    if inner.flow_id.as_deref() != Some(flow_id) {
      return false;
    }
    inner.flow.nodes = update(&inner.flow.nodes);
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use composer_flow::{NodeKind, NodeStatus, ResultData};

  fn flow_with(id: &str) -> Flow {
    Flow::new(
      vec![Node::new(id, NodeKind::Result(ResultData::default()))],
      vec![],
    )
  }

  fn mark_error(nodes: &[Node]) -> Vec<Node> {
    nodes
      .iter()
      .map(|n| {
        n.with_status(NodeStatus {
          error: true,
          ..n.status.clone()
        })
      })
      .collect()
  }

  #[test]
  fn test_update_if_active_respects_open_flow() {
    let state = SharedFlowState::with_open("a", flow_with("r"));

    assert!(state.update_if_active("a", &mark_error));
    assert!(state.nodes()[0].status.error);

    state.open("b", flow_with("other"));
    assert!(!state.update_if_active("a", &mark_error));
    assert!(!state.nodes()[0].status.error);
    assert_eq!(state.active_flow_id().as_deref(), Some("b"));
  }

  #[test]
  fn test_closed_state_accepts_no_conditional_writes() {
    let state = SharedFlowState::new();
    assert!(state.active_flow_id().is_none());
    assert!(!state.update_if_active("a", &mark_error));

    state.open("a", flow_with("r"));
    state.close();
    assert!(state.nodes().is_empty());
  }

  #[test]
  fn test_snapshot_only_reads_the_open_flow() {
    let state = SharedFlowState::with_open("a", flow_with("r"));

    let (nodes, edges) = state.snapshot("a").unwrap();
    assert_eq!(nodes[0].id, "r");
    assert!(edges.is_empty());

    state.open("b", flow_with("other"));
    assert!(state.snapshot("a").is_none());
    assert_eq!(state.snapshot("b").unwrap().0[0].id, "other");

    state.close();
    assert!(state.snapshot("b").is_none());
  }
}
