use async_trait::async_trait;
use composer_flow::ProviderKind;
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResult};
use crate::Provider;

/// A provider that never leaves the process.
///
/// Answers with the `prompt` input when there is one, otherwise with the first
/// input value. Used for dry runs.
#[derive(Debug, Clone)]
pub struct EchoProvider {
  kind: ProviderKind,
}

impl EchoProvider {
  pub fn new(kind: ProviderKind) -> Self {
    Self { kind }
  }
}

#[async_trait]
impl Provider for EchoProvider {
  fn kind(&self) -> ProviderKind {
    self.kind
  }

  async fn run(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
    let echoed = request
      .inputs
      .get("prompt")
      .or_else(|| request.inputs.values().next())
      .cloned();

    Ok(match echoed {
      Some(Value::Null) | None => ProviderResult::failed(format!(
        "nothing to echo for '{}'",
        request.workflow_identifier
      )),
      Some(value) => ProviderResult::succeeded(value),
    })
  }
}
