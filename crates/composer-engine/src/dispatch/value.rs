use async_trait::async_trait;
use composer_flow::{Node, NodeKind};

use super::{DispatchContext, NodeHandler, NodeOutcome};
use crate::error::ExecutionError;
use crate::input::Inputs;

/// Emits the stored value, falling back to the field default.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveHandler;

#[async_trait]
impl NodeHandler for PrimitiveHandler {
  async fn run(
    &self,
    node: &Node,
    _inputs: Inputs,
    _ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    let NodeKind::Primitive(data) = &node.kind else {
      return Ok(NodeOutcome::Empty);
    };

    let value = data
      .value
      .clone()
      .filter(|v| !v.is_null())
      .or_else(|| data.field.as_ref().and_then(|f| f.default.clone()));

    Ok(value.map_or(NodeOutcome::Empty, NodeOutcome::Output))
  }
}

/// Forwards the first collected input.
#[derive(Debug, Clone, Default)]
pub struct ResultHandler;

#[async_trait]
impl NodeHandler for ResultHandler {
  async fn run(
    &self,
    _node: &Node,
    inputs: Inputs,
    _ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    Ok(
      inputs
        .into_iter()
        .map(|(_, v)| v)
        .next()
        .map_or(NodeOutcome::Empty, NodeOutcome::Output),
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct CommentHandler;

#[async_trait]
impl NodeHandler for CommentHandler {
  async fn run(
    &self,
    _node: &Node,
    _inputs: Inputs,
    _ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::Empty)
  }
}
