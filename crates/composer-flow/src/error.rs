use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("edge '{edge_id}' references unknown node '{node_id}'")]
  DanglingEdge { edge_id: String, node_id: String },

  #[error("flow contains a cycle through: {}", nodes.join(", "))]
  Cycle { nodes: Vec<String> },

  #[error("invalid flow document: {0}")]
  Parse(#[from] serde_json::Error),
}
