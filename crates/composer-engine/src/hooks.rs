//! Injected capabilities consulted while dispatching nodes.

use async_trait::async_trait;
use composer_artifact::ArtifactError;
use composer_flow::WorkflowDescriptor;
use composer_provider::{ProviderError, ProviderResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::DispatchDenied;

/// Pre-dispatch authorization of model calls.
#[async_trait]
pub trait DispatchGuard: Send + Sync {
  async fn authorize(
    &self,
    flow_id: &str,
    workflow: &WorkflowDescriptor,
  ) -> Result<(), DispatchDenied>;
}

/// Allows every call.
#[derive(Debug, Clone, Default)]
pub struct AllowAll;

#[async_trait]
impl DispatchGuard for AllowAll {
  async fn authorize(&self, _: &str, _: &WorkflowDescriptor) -> Result<(), DispatchDenied> {
    Ok(())
  }
}

/// Rewrites string inputs before they reach a provider, e.g. turning local
/// file references into hosted URIs.
#[async_trait]
pub trait InputNormalizer: Send + Sync {
  async fn normalize_str(&self, flow_id: &str, value: String) -> Result<Value, ArtifactError>;
}

/// Leaves every value as it is.
#[derive(Debug, Clone, Default)]
pub struct Passthrough;

#[async_trait]
impl InputNormalizer for Passthrough {
  async fn normalize_str(&self, _: &str, value: String) -> Result<Value, ArtifactError> {
    Ok(Value::String(value))
  }
}

/// Normalize every string nested anywhere in `inputs`.
pub async fn normalize_inputs(
  normalizer: &dyn InputNormalizer,
  flow_id: &str,
  inputs: Map<String, Value>,
) -> Result<Map<String, Value>, ArtifactError> {
  let mut normalized = Map::with_capacity(inputs.len());
  for (key, value) in inputs {
    normalized.insert(key, normalize_value(normalizer, flow_id, value).await?);
  }
  Ok(normalized)
}

fn normalize_value<'a>(
  normalizer: &'a dyn InputNormalizer,
  flow_id: &'a str,
  value: Value,
) -> BoxFuture<'a, Result<Value, ArtifactError>> {
  async move {
    match value {
      Value::String(s) => normalizer.normalize_str(flow_id, s).await,
      Value::Array(items) => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          out.push(normalize_value(normalizer, flow_id, item).await?);
        }
        Ok(Value::Array(out))
      }
      Value::Object(map) => Ok(Value::Object(
        normalize_inputs(normalizer, flow_id, map).await?,
      )),
      other => Ok(other),
    }
  }
  .boxed()
}

/// Swaps the audio track of a video.
///
/// Reports through the same structured result as a model call.
#[async_trait]
pub trait AudioMuxer: Send + Sync {
  async fn replace_audio(&self, video: &str, audio: &str) -> Result<ProviderResult, ProviderError>;
}
