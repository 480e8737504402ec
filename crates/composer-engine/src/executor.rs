//! Flow executor implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use composer_flow::{Edge, Flow, Graph, Node, NodeKindTag, NodeStatus, levels};
use futures::future::join_all;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::capabilities::Capabilities;
use crate::dispatch::{DispatchContext, HandlerTable, NodeOutcome};
use crate::enrich::record_example;
use crate::error::ExecutionError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::input::collect;
use crate::registry::ExecutionRegistry;
use crate::sinks::ExampleOutput;
use crate::state::FlowState;
use crate::working::{FlowSnapshot, WorkingCopy};

/// Configuration for the flow executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
  /// Persist a draft of the working copy after every level.
  pub draft_after_each_level: bool,
  /// Upload folder for example outputs. Defaults to the media kind's folder.
  pub example_folder: Option<String>,
}

impl Default for ExecutorConfig {
  fn default() -> Self {
    Self {
      draft_after_each_level: true,
      example_folder: None,
    }
  }
}

/// How a call to [`FlowExecutor::execute`] ended, short of a fatal error.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
  /// The flow was already running; nothing was done.
  AlreadyRunning,
  /// Another flow (or none) is open in the state; nothing was done.
  NotOpen,
  /// Every node settled without failing.
  Succeeded(RunReport),
  /// Every level ran, but at least one node failed or was skipped.
  CompletedWithErrors(RunReport),
}

impl ExecutionOutcome {
  pub fn report(&self) -> Option<&RunReport> {
    match self {
      ExecutionOutcome::AlreadyRunning | ExecutionOutcome::NotOpen => None,
      ExecutionOutcome::Succeeded(report) | ExecutionOutcome::CompletedWithErrors(report) => {
        Some(report)
      }
    }
  }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub execution_id: String,
  /// Recorded output per node.
  pub outputs: HashMap<String, Value>,
  /// Nodes that failed or were skipped, sorted.
  pub failed: Vec<String>,
  /// Final version of the run's working copy.
  pub snapshot: FlowSnapshot,
  pub example: Option<ExampleOutput>,
}

#[derive(Debug, Default)]
struct Progress {
  outputs: HashMap<String, Value>,
  failed: HashSet<String>,
}

/// One run in flight: where its writes go.
struct Run<'a> {
  flow_id: &'a str,
  execution_id: &'a str,
  working: &'a WorkingCopy,
  state: &'a dyn FlowState,
}

impl Run<'_> {
  /// Update a node's status on the working copy, and on shared state while
  /// this flow is the open one.
  fn write_status(&self, node_id: &str, update: impl Fn(&NodeStatus) -> NodeStatus + Sync) {
    self
      .working
      .update(node_id, |n| n.with_status(update(&n.status)));
    self.state.update_if_active(self.flow_id, &|nodes: &[Node]| {
      nodes
        .iter()
        .map(|n| {
          if n.id == node_id {
            n.with_status(update(&n.status))
          } else {
            n.clone()
          }
        })
        .collect()
    });
  }

  /// Clear every node's running flag.
  fn reset_running(&self) {
    let stop = |n: &Node| {
      n.with_status(NodeStatus {
        running: false,
        ..n.status.clone()
      })
    };
    self.working.update_all(stop);
    self
      .state
      .update_if_active(self.flow_id, &|nodes: &[Node]| nodes.iter().map(stop).collect());
  }
}

/// The flow executor.
///
/// Runs a flow level by level: nodes of one level are dispatched
/// concurrently and the next level starts only once all of them settle.
/// Generic over `N: ExecutionNotifier` to allow different notification
/// strategies.
pub struct FlowExecutor<N: ExecutionNotifier = NoopNotifier> {
  config: ExecutorConfig,
  capabilities: Capabilities,
  handlers: HandlerTable,
  registry: Arc<ExecutionRegistry>,
  notifier: N,
}

impl FlowExecutor<NoopNotifier> {
  /// Create an executor that discards events.
  pub fn new(config: ExecutorConfig, capabilities: Capabilities) -> Self {
    Self::with_notifier(config, capabilities, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> FlowExecutor<N> {
  /// Create an executor with a custom notifier.
  ///
  /// Runs are tracked in the process-wide [`ExecutionRegistry::global`].
  pub fn with_notifier(config: ExecutorConfig, capabilities: Capabilities, notifier: N) -> Self {
    Self {
      config,
      capabilities,
      handlers: HandlerTable::standard(),
      registry: ExecutionRegistry::global(),
      notifier,
    }
  }

  /// Track runs in `registry` instead of the global one.
  pub fn with_registry(mut self, registry: Arc<ExecutionRegistry>) -> Self {
    self.registry = registry;
    self
  }

  /// Dispatch through `handlers` instead of [`HandlerTable::standard`].
  pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
    self.handlers = handlers;
    self
  }

  pub fn registry(&self) -> &Arc<ExecutionRegistry> {
    &self.registry
  }

  /// Execute the flow currently held by `state` under `flow_id`.
  ///
  /// Returns [`ExecutionOutcome::AlreadyRunning`] without doing anything when
  /// a run of the same flow is in flight, and [`ExecutionOutcome::NotOpen`]
  /// when `state` is showing a different flow. Node failures do not make this an
  /// `Err`; only an unexpected failure (a provider or store error) does, after
  /// every node's running flag has been cleared.
  #[instrument(name = "flow_execute", skip_all, fields(flow_id = %flow_id))]
  pub async fn execute(
    &self,
    flow_id: &str,
    state: &dyn FlowState,
  ) -> Result<ExecutionOutcome, ExecutionError> {
    let Some(_guard) = self.registry.try_start(flow_id) else {
      info!(flow_id = %flow_id, "flow_already_running");
      return Ok(ExecutionOutcome::AlreadyRunning);
    };

    let Some((nodes, edges)) = state.snapshot(flow_id) else {
      warn!(flow_id = %flow_id, active = ?state.active_flow_id(), "flow_not_open");
      return Ok(ExecutionOutcome::NotOpen);
    };

    let execution_id = uuid::Uuid::new_v4().to_string();
    let working = WorkingCopy::new(FlowSnapshot::new(nodes, edges));
    let flow = working.snapshot().to_flow();
    let graph = flow.graph();
    let run = Run {
      flow_id,
      execution_id: &execution_id,
      working: &working,
      state,
    };

    info!(
      execution_id = %execution_id,
      flow_id = %flow_id,
      nodes = working.snapshot().nodes().len(),
      "flow_started"
    );
    self.notifier.notify(ExecutionEvent::Started {
      flow_id: flow_id.to_string(),
      execution_id: execution_id.clone(),
    });

    let progress = match self.run_levels(&run, &flow, &graph).await {
      Ok(progress) => progress,
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "flow_failed");
        run.reset_running();
        self.notifier.notify(ExecutionEvent::Failed {
          flow_id: flow_id.to_string(),
          error: e.to_string(),
        });
        return Err(e);
      }
    };

    let snapshot = working.snapshot();
    let mut failed: Vec<String> = progress.failed.into_iter().collect();
    failed.sort();

    if !failed.is_empty() {
      warn!(execution_id = %execution_id, failed = ?failed, "flow_completed_with_errors");
      self.notifier.notify(ExecutionEvent::CompletedWithErrors {
        flow_id: flow_id.to_string(),
      });
      return Ok(ExecutionOutcome::CompletedWithErrors(RunReport {
        execution_id,
        outputs: progress.outputs,
        failed,
        snapshot,
        example: None,
      }));
    }

    let example = record_example(
      &self.capabilities,
      self.config.example_folder.as_deref(),
      flow_id,
      &snapshot,
      &graph,
      &progress.outputs,
    )
    .await;

    info!(execution_id = %execution_id, "flow_completed");
    self.notifier.notify(ExecutionEvent::Succeeded {
      flow_id: flow_id.to_string(),
      example: example.clone(),
    });

    Ok(ExecutionOutcome::Succeeded(RunReport {
      execution_id,
      outputs: progress.outputs,
      failed,
      snapshot,
      example,
    }))
  }

  /// Run every level in order.
  async fn run_levels(
    &self,
    run: &Run<'_>,
    flow: &Flow,
    graph: &Graph,
  ) -> Result<Progress, ExecutionError> {
    let mut by_id: HashMap<&str, &Node> = HashMap::with_capacity(flow.nodes.len());
    for node in &flow.nodes {
      by_id.entry(node.id.as_str()).or_insert(node);
    }

    let plan: Vec<Vec<&str>> = levels(&flow.nodes, &flow.edges)
      .into_iter()
      .map(|level| level.into_iter().map(|n| n.id.as_str()).collect())
      .collect();

    let mut progress = Progress::default();

    for (depth, level) in plan.iter().enumerate() {
      info!(
        execution_id = %run.execution_id,
        level = depth,
        nodes = ?level,
        "level_started"
      );

      let mut ready: Vec<&Node> = Vec::with_capacity(level.len());
      for &node_id in level {
        if has_failed_upstream(node_id, graph, &progress.failed) {
          self.skip(run, node_id);
          progress.failed.insert(node_id.to_string());
        } else if let Some(node) = by_id.get(node_id) {
          ready.push(*node);
        }
      }

      // Barrier: the whole level settles before the next one starts.
      let settled = join_all(ready.iter().map(|node| {
        self.run_node(run, node, graph.incoming(&node.id), &progress.outputs)
      }))
      .await;

      let mut fatal = None;
      for (node, result) in ready.iter().zip(settled) {
        match result {
          Ok(NodeOutcome::Output(value)) => {
            progress.outputs.insert(node.id.clone(), value);
          }
          Ok(NodeOutcome::Empty) => {}
          Ok(NodeOutcome::Failed(_)) => {
            progress.failed.insert(node.id.clone());
          }
          Err(e) => {
            fatal.get_or_insert(e);
          }
        }
      }
      if let Some(e) = fatal {
        return Err(e);
      }

      self.save_draft(run).await;
    }

    Ok(progress)
  }

  /// Dispatch one node and record how it settled.
  async fn run_node(
    &self,
    run: &Run<'_>,
    node: &Node,
    incoming: &[Edge],
    outputs: &HashMap<String, Value>,
  ) -> Result<NodeOutcome, ExecutionError> {
    let handler = self
      .handlers
      .get(node.tag())
      .ok_or_else(|| ExecutionError::MissingHandler {
        node_id: node.id.clone(),
        kind: node.tag().to_string(),
      })?;

    run.write_status(&node.id, |s| NodeStatus {
      running: true,
      error: false,
      ..s.clone()
    });
    info!(
      execution_id = %run.execution_id,
      node_id = %node.id,
      kind = %node.tag(),
      "node_started"
    );
    self.notifier.notify(ExecutionEvent::NodeStarted {
      flow_id: run.flow_id.to_string(),
      node_id: node.id.clone(),
    });

    let ctx = DispatchContext {
      flow_id: run.flow_id,
      execution_id: run.execution_id,
      capabilities: &self.capabilities,
    };
    let outcome = handler.run(node, collect(node, incoming, outputs), &ctx).await?;

    match &outcome {
      NodeOutcome::Output(value) => {
        let src = displays_output(node).then(|| value.clone());
        run.write_status(&node.id, |_| NodeStatus {
          running: false,
          error: false,
          value: Some(value.clone()),
          src: src.clone(),
        });
        info!(
          execution_id = %run.execution_id,
          node_id = %node.id,
          output = %value,
          "node_completed"
        );
        self.notifier.notify(ExecutionEvent::NodeCompleted {
          flow_id: run.flow_id.to_string(),
          node_id: node.id.clone(),
          output: Some(value.clone()),
        });
      }
      NodeOutcome::Empty => {
        run.write_status(&node.id, |s| NodeStatus {
          running: false,
          ..s.clone()
        });
        info!(execution_id = %run.execution_id, node_id = %node.id, "node_completed");
        self.notifier.notify(ExecutionEvent::NodeCompleted {
          flow_id: run.flow_id.to_string(),
          node_id: node.id.clone(),
          output: None,
        });
      }
      NodeOutcome::Failed(message) => {
        run.write_status(&node.id, |s| NodeStatus {
          running: false,
          error: true,
          ..s.clone()
        });
        error!(
          execution_id = %run.execution_id,
          node_id = %node.id,
          error = %message,
          "node_failed"
        );
        self.notifier.notify(ExecutionEvent::FailedWithError {
          flow_id: run.flow_id.to_string(),
          node_id: node.id.clone(),
          message: message.clone(),
        });
      }
    }

    Ok(outcome)
  }

  /// Mark a node failed without dispatching it.
  fn skip(&self, run: &Run<'_>, node_id: &str) {
    run.write_status(node_id, |s| NodeStatus {
      running: false,
      error: true,
      ..s.clone()
    });
    warn!(
      execution_id = %run.execution_id,
      node_id = %node_id,
      "node_skipped"
    );
    self.notifier.notify(ExecutionEvent::NodeSkipped {
      flow_id: run.flow_id.to_string(),
      node_id: node_id.to_string(),
    });
  }

  async fn save_draft(&self, run: &Run<'_>) {
    if !self.config.draft_after_each_level {
      return;
    }
    let snapshot = run.working.snapshot();
    if let Err(e) = self
      .capabilities
      .drafts
      .save_draft(run.flow_id, &snapshot)
      .await
    {
      warn!(flow_id = %run.flow_id, error = %e, "failed to save draft");
    }
  }
}

fn has_failed_upstream(node_id: &str, graph: &Graph, failed: &HashSet<String>) -> bool {
  graph
    .upstream(node_id)
    .into_iter()
    .any(|source| failed.contains(source))
}

/// Whether the editor previews this node's output.
fn displays_output(node: &Node) -> bool {
  node.tag() == NodeKindTag::Result || node.kind.media_kind().is_some()
}
