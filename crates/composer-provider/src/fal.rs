//! Fal.ai client.
//!
//! Uses the synchronous `https://fal.run/{model}` endpoint, which answers once
//! the model finishes.

use async_trait::async_trait;
use composer_flow::ProviderKind;
use reqwest::Client;
use serde_json::Value;

use crate::Provider;
use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResult};

/// Configuration for the Fal.ai client.
#[derive(Debug, Clone)]
pub struct FalConfig {
  pub api_base: String,
  pub key: String,
}

impl FalConfig {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      api_base: "https://fal.run".to_string(),
      key: key.into(),
    }
  }
}

/// [`Provider`] backed by the Fal.ai HTTP API.
#[derive(Debug, Clone)]
pub struct FalProvider {
  client: Client,
  config: FalConfig,
}

impl FalProvider {
  pub fn new(config: FalConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }
}

/// Pick the artifact out of a Fal response body.
///
/// Fal models shape their output by media type; the first match wins. Bodies
/// without a recognizable artifact are returned whole.
fn extract_output(body: Value) -> Value {
  let candidates = [
    body.pointer("/images/0/url"),
    body.pointer("/image/url"),
    body.pointer("/video/url"),
    body.pointer("/audio/url"),
    body.pointer("/audio_file/url"),
    body.get("output"),
  ];

  let found = candidates
    .into_iter()
    .flatten()
    .find(|v| !v.is_null())
    .cloned();
  found.unwrap_or(body)
}

#[async_trait]
impl Provider for FalProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Fal
  }

  async fn run(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
    let url = format!(
      "{}/{}",
      self.config.api_base.trim_end_matches('/'),
      request.workflow_identifier
    );

    let response = self
      .client
      .post(&url)
      .header("Authorization", format!("Key {}", self.config.key))
      .json(&request.inputs)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Ok(ProviderResult::failed(format!(
        "fal returned {}: {}",
        status, detail
      )));
    }

    let body: Value = response.json().await?;
    Ok(ProviderResult::succeeded(extract_output(body)))
  }
}
