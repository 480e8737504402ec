//! Per-kind node handlers.
//!
//! Every [`NodeKindTag`] has exactly one [`NodeHandler`]; the table is built
//! from an exhaustive match so a new node kind cannot be added without one.

mod combine;
mod media;
mod value;
mod workflow;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use composer_flow::{Node, NodeKindTag};
use serde_json::Value;
use tracing::warn;

use crate::capabilities::Capabilities;
use crate::error::ExecutionError;
use crate::input::Inputs;

pub use combine::{CombineImagesHandler, CombineTextHandler};
pub use media::ReplaceAudioHandler;
pub use value::{CommentHandler, PrimitiveHandler, ResultHandler};
pub use workflow::WorkflowHandler;

/// How a node settled.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
  /// The node produced a value for downstream nodes.
  Output(Value),
  /// The node ran but has nothing to pass on.
  Empty,
  /// The node failed. Downstream nodes are skipped; siblings carry on.
  Failed(String),
}

/// What a handler may see of the run it belongs to.
pub struct DispatchContext<'a> {
  pub flow_id: &'a str,
  pub execution_id: &'a str,
  pub capabilities: &'a Capabilities,
}

/// Executes one kind of node.
#[async_trait]
pub trait NodeHandler: Send + Sync {
  /// Run `node` with its collected inputs.
  ///
  /// Expected failures are returned as [`NodeOutcome::Failed`]; an `Err`
  /// aborts the whole run.
  async fn run(
    &self,
    node: &Node,
    inputs: Inputs,
    ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError>;
}

/// Handler lookup keyed by node kind.
#[derive(Clone)]
pub struct HandlerTable {
  handlers: HashMap<NodeKindTag, Arc<dyn NodeHandler>>,
}

impl HandlerTable {
  /// The built-in handler for every node kind.
  pub fn standard() -> Self {
    let handlers = NodeKindTag::ALL
      .into_iter()
      .map(|tag| {
        let handler: Arc<dyn NodeHandler> = match tag {
          NodeKindTag::Primitive => Arc::new(PrimitiveHandler),
          NodeKindTag::CombineImages => Arc::new(CombineImagesHandler),
          NodeKindTag::CombineText => Arc::new(CombineTextHandler),
          NodeKindTag::ReplaceAudio => Arc::new(ReplaceAudioHandler),
          NodeKindTag::Workflow => Arc::new(WorkflowHandler),
          NodeKindTag::Result => Arc::new(ResultHandler),
          NodeKindTag::Comment => Arc::new(CommentHandler),
        };
        (tag, handler)
      })
      .collect();

    Self { handlers }
  }

  /// Replace the handler for one kind.
  pub fn with_handler(mut self, tag: NodeKindTag, handler: Arc<dyn NodeHandler>) -> Self {
    self.handlers.insert(tag, handler);
    self
  }

  pub fn get(&self, tag: NodeKindTag) -> Option<&Arc<dyn NodeHandler>> {
    self.handlers.get(&tag)
  }
}

impl Default for HandlerTable {
  fn default() -> Self {
    Self::standard()
  }
}

impl std::fmt::Debug for HandlerTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandlerTable")
      .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
      .finish()
  }
}

/// Turn a model output into a node outcome.
///
/// Strings and non-empty arrays are kept. Anything else is logged and
/// dropped; the node still succeeds.
pub(crate) fn extract_output(node_id: &str, output: Option<Value>) -> NodeOutcome {
  match output {
    Some(Value::String(s)) => NodeOutcome::Output(Value::String(s)),
    Some(Value::Array(items)) if !items.is_empty() => NodeOutcome::Output(Value::Array(items)),
    Some(other) => {
      warn!(node_id = %node_id, output = %other, "dropping unusable output");
      NodeOutcome::Empty
    }
    None => {
      warn!(node_id = %node_id, "model returned no output");
      NodeOutcome::Empty
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_every_kind_has_a_handler() {
    let table = HandlerTable::standard();
    for tag in NodeKindTag::ALL {
      assert!(table.get(tag).is_some(), "no handler for {}", tag);
    }
  }

  #[test]
  fn test_extract_output() {
    assert_eq!(
      extract_output("n", Some(json!("https://x/a.png"))),
      NodeOutcome::Output(json!("https://x/a.png"))
    );
    assert_eq!(
      extract_output("n", Some(json!(["a", "b"]))),
      NodeOutcome::Output(json!(["a", "b"]))
    );
    assert_eq!(extract_output("n", Some(json!([]))), NodeOutcome::Empty);
    assert_eq!(extract_output("n", Some(json!({ "a": 1 }))), NodeOutcome::Empty);
    assert_eq!(extract_output("n", Some(json!(3))), NodeOutcome::Empty);
    assert_eq!(extract_output("n", None), NodeOutcome::Empty);
  }
}
