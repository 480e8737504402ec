use async_trait::async_trait;
use composer_flow::Node;
use serde_json::Value;

use super::{DispatchContext, NodeHandler, NodeOutcome, extract_output};
use crate::error::ExecutionError;
use crate::input::Inputs;

/// Replaces a video's audio track through the configured muxer.
#[derive(Debug, Clone, Default)]
pub struct ReplaceAudioHandler;

#[async_trait]
impl NodeHandler for ReplaceAudioHandler {
  async fn run(
    &self,
    node: &Node,
    inputs: Inputs,
    ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    let Some(muxer) = ctx.capabilities.muxer.as_ref() else {
      return Ok(NodeOutcome::Failed(
        "no audio muxer is configured".to_string(),
      ));
    };

    let (Some(video), Some(audio)) = (first_str(&inputs, "video"), first_str(&inputs, "audio"))
    else {
      return Ok(NodeOutcome::Failed(
        "replace audio needs both a video and an audio input".to_string(),
      ));
    };

    let result = muxer
      .replace_audio(video, audio)
      .await
      .map_err(|source| ExecutionError::Provider {
        node_id: node.id.clone(),
        source,
      })?;

    if !result.success {
      return Ok(NodeOutcome::Failed(
        result
          .error
          .unwrap_or_else(|| "audio replacement failed".to_string()),
      ));
    }

    Ok(extract_output(&node.id, result.primary_output().cloned()))
  }
}

/// A string input, taking the first element of an array.
fn first_str<'a>(inputs: &'a Inputs, key: &str) -> Option<&'a str> {
  match inputs.get(key)? {
    Value::String(s) => Some(s),
    Value::Array(items) => items.first().and_then(Value::as_str),
    _ => None,
  }
}
