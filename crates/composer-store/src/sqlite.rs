use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::types::{CachedRun, NewRun, RunRecord, RunStatus};
use crate::{RunStore, StoreError};

/// SQLite-based run store.
pub struct SqliteRunStore {
  pool: SqlitePool,
}

#[derive(FromRow)]
struct RunRow {
  id: String,
  workflow_id: Option<i64>,
  provider: String,
  inputs: Json<Map<String, Value>>,
  input_hash: String,
  status: RunStatus,
  output: Option<Json<Value>>,
  error: Option<String>,
  created_at: DateTime<Utc>,
  completed_at: Option<DateTime<Utc>>,
}

impl From<RunRow> for RunRecord {
  fn from(row: RunRow) -> Self {
    Self {
      id: row.id,
      workflow_id: row.workflow_id,
      provider: row.provider,
      inputs: row.inputs.0,
      input_hash: row.input_hash,
      status: row.status,
      output: row.output.map(|o| o.0),
      error: row.error,
      created_at: row.created_at,
      completed_at: row.completed_at,
    }
  }
}

#[derive(FromRow)]
struct CachedRow {
  id: String,
  output: Json<Value>,
  completed_at: Option<DateTime<Utc>>,
}

impl SqliteRunStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl RunStore for SqliteRunStore {
  async fn create_run(&self, run: NewRun) -> Result<String, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
      r#"
            INSERT INTO runs (id, workflow_id, provider, inputs, input_hash, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&id)
    .bind(run.workflow_id)
    .bind(run.provider.as_str())
    .bind(Json(&run.inputs))
    .bind(&run.input_hash)
    .bind(RunStatus::Pending)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(id)
  }

  async fn update_run(
    &self,
    run_id: &str,
    status: RunStatus,
    output: Option<&Value>,
    error: Option<&str>,
  ) -> Result<(), StoreError> {
    let completed_at = status.is_terminal().then(Utc::now);

    let result = sqlx::query(
      r#"
            UPDATE runs
            SET status = ?,
                output = COALESCE(?, output),
                error = COALESCE(?, error),
                completed_at = COALESCE(?, completed_at)
            WHERE id = ?
            "#,
    )
    .bind(status)
    .bind(output.map(Json))
    .bind(error)
    .bind(completed_at)
    .bind(run_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(run_id.to_string()));
    }
    Ok(())
  }

  async fn find_cached_run(
    &self,
    workflow_id: i64,
    input_hash: &str,
  ) -> Result<Option<CachedRun>, StoreError> {
    let row: Option<CachedRow> = sqlx::query_as(
      r#"
            SELECT id, output, completed_at
            FROM runs
            WHERE workflow_id = ? AND input_hash = ? AND status = ? AND output IS NOT NULL
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
    )
    .bind(workflow_id)
    .bind(input_hash)
    .bind(RunStatus::Completed)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row.map(|r| CachedRun {
      run_id: r.id,
      output: r.output.0,
      completed_at: r.completed_at,
    }))
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError> {
    let row: Option<RunRow> = sqlx::query_as(
      r#"
            SELECT id, workflow_id, provider, inputs, input_hash, status, output, error, created_at, completed_at
            FROM runs
            WHERE id = ?
            "#,
    )
    .bind(run_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(RunRecord::from)
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
  }
}
