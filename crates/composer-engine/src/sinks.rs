//! Persistence hooks for run progress and results.

use async_trait::async_trait;
use composer_flow::MediaKind;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::working::FlowSnapshot;

/// The artifact a successful run is remembered by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleOutput {
  /// The result node the artifact was taken from.
  pub node_id: String,
  pub media_kind: MediaKind,
  pub url: String,
}

/// Stores in-progress copies of a flow.
#[async_trait]
pub trait DraftSink: Send + Sync {
  async fn save_draft(&self, flow_id: &str, snapshot: &FlowSnapshot) -> Result<(), SinkError>;
}

/// Records the example output of a successful run.
#[async_trait]
pub trait ExampleSink: Send + Sync {
  async fn record_example(&self, flow_id: &str, example: &ExampleOutput) -> Result<(), SinkError>;
}

/// Discards drafts and examples.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl DraftSink for NoopSink {
  async fn save_draft(&self, _: &str, _: &FlowSnapshot) -> Result<(), SinkError> {
    Ok(())
  }
}

#[async_trait]
impl ExampleSink for NoopSink {
  async fn record_example(&self, _: &str, _: &ExampleOutput) -> Result<(), SinkError> {
    Ok(())
  }
}
