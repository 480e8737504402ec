//! Error types for flow execution.

use composer_provider::ProviderError;
use composer_store::StoreError;
use thiserror::Error;

/// Errors that abort a flow run.
///
/// A node that fails in an expected way (the provider reports
/// `success: false`, a required input is missing) is not an error; it is a
/// [`crate::NodeOutcome::Failed`] and the run carries on.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// A provider call failed below the level of a structured result.
  #[error("provider call failed for node '{node_id}': {source}")]
  Provider {
    node_id: String,
    #[source]
    source: ProviderError,
  },

  /// Run bookkeeping failed.
  #[error("run store failed for node '{node_id}': {source}")]
  Store {
    node_id: String,
    #[source]
    source: StoreError,
  },

  /// No handler is registered for a node kind.
  #[error("no handler registered for node '{node_id}' of kind '{kind}'")]
  MissingHandler { node_id: String, kind: String },
}

/// The pre-dispatch hook refused a model call.
#[derive(Debug, Error)]
#[error("dispatch denied: {reason}")]
pub struct DispatchDenied {
  pub reason: String,
}

/// A draft or example sink could not persist.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
  pub message: String,
}
