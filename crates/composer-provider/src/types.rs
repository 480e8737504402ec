use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single model invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
  /// Provider-specific model identifier.
  pub workflow_identifier: String,
  /// Normalized model inputs.
  pub inputs: Map<String, Value>,
}

/// Structured outcome of a model invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
  pub success: bool,
  /// Hosted location of the produced artifact. Preferred over `output`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_path: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ProviderResult {
  pub fn succeeded(output: Value) -> Self {
    Self {
      success: true,
      output: Some(output),
      ..Default::default()
    }
  }

  pub fn failed(error: impl Into<String>) -> Self {
    Self {
      success: false,
      error: Some(error.into()),
      ..Default::default()
    }
  }

  /// The value a node should record: `output_path`, falling back to `output`.
  pub fn primary_output(&self) -> Option<&Value> {
    self.output_path.as_ref().or(self.output.as_ref())
  }
}
