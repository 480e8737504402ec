use serde::{Deserialize, Serialize};

/// Input slot used when an edge does not name a target handle.
pub const DEFAULT_HANDLE: &str = "input";

/// A directed data dependency from one node's output to a named input slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
  pub id: String,
  pub source: String,
  pub target: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_handle: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_handle: Option<String>,
}

impl Edge {
  pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      source: source.into(),
      target: target.into(),
      source_handle: None,
      target_handle: None,
    }
  }

  /// Set the input slot on the target node.
  pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
    self.target_handle = Some(handle.into());
    self
  }

  /// The input slot this edge fills on its target.
  pub fn slot(&self) -> &str {
    self.target_handle.as_deref().unwrap_or(DEFAULT_HANDLE)
  }

  /// Whether two edges compete for the same input slot.
  pub fn occupies_same_slot(&self, other: &Edge) -> bool {
    self.target == other.target && self.slot() == other.slot()
  }
}
