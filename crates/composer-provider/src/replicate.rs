//! Replicate client.
//!
//! Identifiers of the form `owner/name` run the model's latest version through
//! `POST /v1/models/{owner}/{name}/predictions`; `owner/name:version` pins a
//! version through `POST /v1/predictions`. Requests ask Replicate to hold the
//! connection until the prediction settles (`Prefer: wait`) and fall back to
//! polling the prediction URL when it does not.

use std::time::Duration;

use async_trait::async_trait;
use composer_flow::ProviderKind;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::Provider;
use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResult};

/// Configuration for the Replicate client.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
  pub api_base: String,
  pub token: String,
  /// Delay between status polls.
  pub poll_interval: Duration,
  /// Polls before a prediction is reported as timed out.
  pub max_polls: u32,
}

impl ReplicateConfig {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      api_base: "https://api.replicate.com".to_string(),
      token: token.into(),
      poll_interval: Duration::from_secs(1),
      max_polls: 600,
    }
  }
}

#[derive(Debug, Deserialize)]
struct Prediction {
  #[serde(default)]
  id: String,
  status: String,
  #[serde(default)]
  output: Option<Value>,
  #[serde(default)]
  error: Option<Value>,
  #[serde(default)]
  urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
  get: String,
}

impl Prediction {
  fn is_terminal(&self) -> bool {
    matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
  }

  fn into_result(self) -> ProviderResult {
    match self.status.as_str() {
      "succeeded" => ProviderResult {
        success: true,
        output: self.output,
        ..Default::default()
      },
      "canceled" => ProviderResult::failed(format!("prediction {} was canceled", self.id)),
      _ => ProviderResult::failed(
        self
          .error
          .map(|e| match e {
            Value::String(s) => s,
            other => other.to_string(),
          })
          .unwrap_or_else(|| format!("prediction {} failed", self.id)),
      ),
    }
  }
}

/// [`Provider`] backed by the Replicate HTTP API.
#[derive(Debug, Clone)]
pub struct ReplicateProvider {
  client: Client,
  config: ReplicateConfig,
}

impl ReplicateProvider {
  pub fn new(config: ReplicateConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }

  /// Endpoint and request body for an identifier.
  fn endpoint(&self, request: &ProviderRequest) -> (String, Value) {
    let base = self.config.api_base.trim_end_matches('/');
    match request.workflow_identifier.split_once(':') {
      Some((_, version)) => (
        format!("{}/v1/predictions", base),
        json!({ "version": version, "input": request.inputs }),
      ),
      None => (
        format!(
          "{}/v1/models/{}/predictions",
          base, request.workflow_identifier
        ),
        json!({ "input": request.inputs }),
      ),
    }
  }

  async fn poll(&self, mut prediction: Prediction) -> Result<ProviderResult, ProviderError> {
    for _ in 0..self.config.max_polls {
      if prediction.is_terminal() {
        return Ok(prediction.into_result());
      }

      let Some(urls) = prediction.urls.as_ref() else {
        return Err(ProviderError::InvalidResponse {
          provider: ProviderKind::Replicate.to_string(),
          message: format!("prediction {} has no status url", prediction.id),
        });
      };

      tokio::time::sleep(self.config.poll_interval).await;
      debug!(prediction_id = %prediction.id, status = %prediction.status, "polling prediction");

      prediction = self
        .client
        .get(&urls.get)
        .bearer_auth(&self.config.token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    }

    if prediction.is_terminal() {
      return Ok(prediction.into_result());
    }

    warn!(prediction_id = %prediction.id, "prediction did not settle in time");
    Ok(ProviderResult::failed(format!(
      "prediction {} timed out",
      prediction.id
    )))
  }
}

#[async_trait]
impl Provider for ReplicateProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Replicate
  }

  async fn run(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
    let (url, body) = self.endpoint(&request);

    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.config.token)
      .header("Prefer", "wait")
      .json(&body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Ok(ProviderResult::failed(format!(
        "replicate returned {}: {}",
        status, detail
      )));
    }

    let prediction: Prediction = response.json().await?;
    self.poll(prediction).await
  }
}
