//! Process-wide tracking of running flows.
//!
//! The registry is advisory: it stops a second run of a flow from starting
//! while one is in flight. It cannot stop a run, and entries never expire on
//! their own; they are cleared when the owning [`RunGuard`] drops.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

/// Set of flow ids with a run in progress.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
  running: Mutex<HashSet<String>>,
}

impl ExecutionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The registry shared by every executor in the process.
  pub fn global() -> Arc<ExecutionRegistry> {
    static GLOBAL: OnceLock<Arc<ExecutionRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(ExecutionRegistry::new())).clone()
  }

  /// Mark a flow as running.
  ///
  /// Returns `None` when the flow is already running. The entry is cleared
  /// when the returned guard drops.
  pub fn try_start(self: &Arc<Self>, flow_id: &str) -> Option<RunGuard> {
    let inserted = self
      .running
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(flow_id.to_string());

    if !inserted {
      debug!(flow_id = %flow_id, "flow already running");
      return None;
    }

    Some(RunGuard {
      registry: self.clone(),
      flow_id: flow_id.to_string(),
    })
  }

  /// Clear a flow's running mark.
  pub fn complete(&self, flow_id: &str) {
    self
      .running
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(flow_id);
  }

  pub fn is_running(&self, flow_id: &str) -> bool {
    self
      .running
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .contains(flow_id)
  }

  /// Ids of every running flow, sorted.
  pub fn running(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .running
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .cloned()
      .collect();
    ids.sort();
    ids
  }
}

/// Holds a flow's running mark for the lifetime of a run.
#[derive(Debug)]
pub struct RunGuard {
  registry: Arc<ExecutionRegistry>,
  flow_id: String,
}

impl RunGuard {
  pub fn flow_id(&self) -> &str {
    &self.flow_id
  }
}

impl Drop for RunGuard {
  fn drop(&mut self) {
    self.registry.complete(&self.flow_id);
  }
}
