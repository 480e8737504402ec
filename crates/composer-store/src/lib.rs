//! Composer Store
//!
//! This crate provides the run-record storage trait and implementations. A run
//! record is the audit entry for one provider dispatch, and doubles as an
//! output cache: a completed run is found again by `(workflow_id, input_hash)`
//! so identical requests skip the provider.
//!
//! The [`RunStore`] trait defines operations for:
//! - Creating run records before dispatch
//! - Moving a run through `pending -> running -> completed | failed`
//! - Looking up a cached completed run

mod hash;
mod memory;
mod sqlite;
mod types;

pub use hash::{canonical_json, input_hash};
pub use memory::InMemoryRunStore;
pub use sqlite::SqliteRunStore;
pub use types::{CachedRun, NewRun, RunRecord, RunStatus};

use async_trait::async_trait;
use serde_json::Value;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("run not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Migrations could not be applied.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage for run records.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Create a run record in `pending` state and return its id.
  async fn create_run(&self, run: NewRun) -> Result<String, StoreError>;

  /// Move a run to a new status, recording its output or error.
  ///
  /// `completed` and `failed` also stamp the completion time.
  async fn update_run(
    &self,
    run_id: &str,
    status: RunStatus,
    output: Option<&Value>,
    error: Option<&str>,
  ) -> Result<(), StoreError>;

  /// Find the most recent completed run of a workflow for the given inputs.
  async fn find_cached_run(
    &self,
    workflow_id: i64,
    input_hash: &str,
  ) -> Result<Option<CachedRun>, StoreError>;

  /// Get a run by ID.
  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError>;
}
