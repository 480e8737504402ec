use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::types::{CachedRun, NewRun, RunRecord, RunStatus};
use crate::{RunStore, StoreError};

/// Process-local run store. Records live as long as the store.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
  // Insertion order doubles as recency for cache lookups.
  runs: Mutex<Vec<RunRecord>>,
}

impl InMemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of every record, oldest first.
  pub fn runs(&self) -> Vec<RunRecord> {
    self.runs.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
  async fn create_run(&self, run: NewRun) -> Result<String, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let record = RunRecord {
      id: id.clone(),
      workflow_id: run.workflow_id,
      provider: run.provider.to_string(),
      inputs: run.inputs,
      input_hash: run.input_hash,
      status: RunStatus::Pending,
      output: None,
      error: None,
      created_at: Utc::now(),
      completed_at: None,
    };
    self
      .runs
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(record);
    Ok(id)
  }

  async fn update_run(
    &self,
    run_id: &str,
    status: RunStatus,
    output: Option<&Value>,
    error: Option<&str>,
  ) -> Result<(), StoreError> {
    let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
    let record = runs
      .iter_mut()
      .find(|r| r.id == run_id)
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;

    record.status = status;
    if let Some(output) = output {
      record.output = Some(output.clone());
    }
    if let Some(error) = error {
      record.error = Some(error.to_string());
    }
    if status.is_terminal() {
      record.completed_at = Some(Utc::now());
    }
    Ok(())
  }

  async fn find_cached_run(
    &self,
    workflow_id: i64,
    input_hash: &str,
  ) -> Result<Option<CachedRun>, StoreError> {
    let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
    Ok(
      runs
        .iter()
        .rev()
        .filter(|r| r.workflow_id == Some(workflow_id) && r.input_hash == input_hash)
        .filter(|r| r.status == RunStatus::Completed)
        .find_map(|r| {
          r.output.clone().map(|output| CachedRun {
            run_id: r.id.clone(),
            output,
            completed_at: r.completed_at,
          })
        }),
    )
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError> {
    self
      .runs
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .find(|r| r.id == run_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
  }
}
