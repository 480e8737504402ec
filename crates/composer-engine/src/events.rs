//! Execution events and notifiers.
//!
//! Events are emitted during a flow run so the UI layer can react without the
//! engine knowing anything about it. The flow-level events are the run's
//! callbacks:
//!
//! | event | callback |
//! |---|---|
//! | [`ExecutionEvent::Started`] | on started |
//! | [`ExecutionEvent::Succeeded`] | on success |
//! | [`ExecutionEvent::CompletedWithErrors`] | on error (completed with errors) |
//! | [`ExecutionEvent::Failed`] | on failed |
//! | [`ExecutionEvent::FailedWithError`] | on failed with error (per node) |

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::sinks::ExampleOutput;

/// Events emitted during flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The run passed the registry guard and is starting.
  Started {
    flow_id: String,
    execution_id: String,
  },

  /// A node was handed to its handler.
  NodeStarted { flow_id: String, node_id: String },

  /// A node settled without failing.
  NodeCompleted {
    flow_id: String,
    node_id: String,
    output: Option<serde_json::Value>,
  },

  /// A node was not run because an upstream node failed.
  NodeSkipped { flow_id: String, node_id: String },

  /// A node failed; the run carries on.
  FailedWithError {
    flow_id: String,
    node_id: String,
    message: String,
  },

  /// Every node succeeded.
  Succeeded {
    flow_id: String,
    example: Option<ExampleOutput>,
  },

  /// Every level ran but at least one node failed.
  CompletedWithErrors { flow_id: String },

  /// The run was aborted by an unexpected error.
  Failed { flow_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them (update a UI, persist, ignore).
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a level.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

impl<N: ExecutionNotifier + ?Sized> ExecutionNotifier for std::sync::Arc<N> {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}
