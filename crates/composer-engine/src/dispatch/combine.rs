use async_trait::async_trait;
use composer_flow::Node;
use serde_json::Value;

use super::{DispatchContext, NodeHandler, NodeOutcome};
use crate::error::ExecutionError;
use crate::input::Inputs;

/// Flattens every collected value into one array.
#[derive(Debug, Clone, Default)]
pub struct CombineImagesHandler;

#[async_trait]
impl NodeHandler for CombineImagesHandler {
  async fn run(
    &self,
    _node: &Node,
    inputs: Inputs,
    _ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::Output(Value::Array(combine_images(inputs))))
  }
}

/// Joins every collected value into newline-separated text.
#[derive(Debug, Clone, Default)]
pub struct CombineTextHandler;

#[async_trait]
impl NodeHandler for CombineTextHandler {
  async fn run(
    &self,
    _node: &Node,
    inputs: Inputs,
    _ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    Ok(NodeOutcome::Output(Value::String(combine_text(inputs))))
  }
}

fn combine_images(inputs: Inputs) -> Vec<Value> {
  let mut images = Vec::new();
  for (_, value) in inputs {
    match value {
      Value::Array(items) => images.extend(items),
      scalar => images.push(scalar),
    }
  }
  images
}

fn combine_text(inputs: Inputs) -> String {
  inputs
    .into_iter()
    .map(|(_, value)| match value {
      Value::String(s) => s,
      other => other.to_string(),
    })
    .collect::<Vec<_>>()
    .join("\n")
}
