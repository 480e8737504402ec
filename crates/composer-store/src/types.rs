use chrono::{DateTime, Utc};
use composer_flow::ProviderKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, RunStatus::Completed | RunStatus::Failed)
  }
}

/// Everything needed to open a run record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
  /// Durable workflow id, when the workflow has been saved.
  pub workflow_id: Option<i64>,
  pub provider: ProviderKind,
  pub inputs: Map<String, Value>,
  pub input_hash: String,
}

/// A run record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub id: String,
  pub workflow_id: Option<i64>,
  pub provider: String,
  pub inputs: Map<String, Value>,
  pub input_hash: String,
  pub status: RunStatus,
  pub output: Option<Value>,
  pub error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// A completed run found by cache lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRun {
  pub run_id: String,
  pub output: Value,
  pub completed_at: Option<DateTime<Utc>>,
}
