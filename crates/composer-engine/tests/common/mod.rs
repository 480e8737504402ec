#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use composer_engine::{
  Capabilities, ChannelNotifier, ExecutionEvent, ExecutionRegistry, ExecutorConfig, FlowExecutor,
  FlowState, NodesUpdate,
};
use composer_flow::{
  CombineData, Edge, Flow, MediaKind, Node, NodeKind, PrimitiveData, ProviderKind, ResultData,
  WorkflowData, WorkflowDescriptor,
};
use composer_provider::{Provider, ProviderError, ProviderRequest, ProviderResult, ProviderSet};
use composer_store::InMemoryRunStore;
use serde_json::Value;
use tokio::sync::{Barrier, Notify, mpsc};

/// What the stub provider does for one model identifier.
#[derive(Clone)]
pub enum Script {
  Succeed(Value),
  Fail(String),
  /// Transport-level error.
  Error,
  /// Wait until every participant reaches the barrier, then succeed.
  Meet(Arc<Barrier>, Value),
  /// Signal `started`, wait for `release`, then succeed.
  Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
    output: Value,
  },
}

/// Provider that follows a script per model identifier and records calls.
#[derive(Default)]
pub struct ScriptedProvider {
  scripts: Mutex<HashMap<String, Script>>,
  calls: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn script(&self, identifier: &str, script: Script) {
    self
      .scripts
      .lock()
      .unwrap()
      .insert(identifier.to_string(), script);
  }

  pub fn calls(&self) -> Vec<ProviderRequest> {
    self.calls.lock().unwrap().clone()
  }

  pub fn called(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .map(|c| c.workflow_identifier)
      .collect()
  }
}

#[async_trait]
impl Provider for ScriptedProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Replicate
  }

  async fn run(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
    self.calls.lock().unwrap().push(request.clone());
    let script = self
      .scripts
      .lock()
      .unwrap()
      .get(&request.workflow_identifier)
      .cloned();

    match script {
      Some(Script::Succeed(output)) => Ok(ProviderResult::succeeded(output)),
      Some(Script::Fail(message)) => Ok(ProviderResult::failed(message)),
      Some(Script::Error) => Err(ProviderError::InvalidResponse {
        provider: "replicate".to_string(),
        message: "connection reset".to_string(),
      }),
      Some(Script::Meet(barrier, output)) => {
        match tokio::time::timeout(Duration::from_secs(2), barrier.wait()).await {
          Ok(_) => Ok(ProviderResult::succeeded(output)),
          Err(_) => Ok(ProviderResult::failed("siblings did not run concurrently")),
        }
      }
      Some(Script::Gate {
        started,
        release,
        output,
      }) => {
        started.notify_one();
        release.notified().await;
        Ok(ProviderResult::succeeded(output))
      }
      None => Ok(ProviderResult::failed(format!(
        "no script for {}",
        request.workflow_identifier
      ))),
    }
  }
}

pub fn primitive(id: &str, value: Value) -> Node {
  Node::new(
    id,
    NodeKind::Primitive(PrimitiveData {
      value: Some(value),
      ..Default::default()
    }),
  )
}

pub fn model(id: &str, identifier: &str) -> Node {
  let mut workflow = WorkflowDescriptor::new(identifier, ProviderKind::Replicate);
  workflow.output_type = Some(MediaKind::Image);
  Node::new(id, NodeKind::Workflow(WorkflowData::new(workflow)))
}

pub fn saved_model(id: &str, identifier: &str, workflow_id: i64) -> Node {
  let mut node = model(id, identifier);
  if let NodeKind::Workflow(data) = &mut node.kind {
    data.workflow.id = Some(workflow_id);
  }
  node
}

pub fn result(id: &str) -> Node {
  Node::new(id, NodeKind::Result(ResultData::default()))
}

pub fn combine_images(id: &str) -> Node {
  Node::new(id, NodeKind::CombineImages(CombineData::default()))
}

pub fn combine_text(id: &str) -> Node {
  Node::new(id, NodeKind::CombineText(CombineData::default()))
}

pub fn edge(source: &str, target: &str) -> Edge {
  Edge::new(format!("{}-{}", source, target), source, target)
}

pub fn edge_to(source: &str, target: &str, handle: &str) -> Edge {
  edge(source, target).with_target_handle(handle)
}

/// Everything a test needs to drive one executor.
pub struct Harness {
  pub executor: Arc<FlowExecutor<ChannelNotifier>>,
  pub provider: Arc<ScriptedProvider>,
  pub runs: Arc<InMemoryRunStore>,
  pub events: mpsc::UnboundedReceiver<ExecutionEvent>,
}

pub fn capabilities(provider: &Arc<ScriptedProvider>, runs: &Arc<InMemoryRunStore>) -> Capabilities {
  Capabilities::new(ProviderSet::uniform(provider.clone()), runs.clone())
}

pub fn harness() -> Harness {
  harness_with(|caps| caps)
}

pub fn harness_with(configure: impl FnOnce(Capabilities) -> Capabilities) -> Harness {
  let provider = ScriptedProvider::new();
  let runs = Arc::new(InMemoryRunStore::new());
  let (tx, events) = mpsc::unbounded_channel();

  let executor = FlowExecutor::with_notifier(
    ExecutorConfig::default(),
    configure(capabilities(&provider, &runs)),
    ChannelNotifier::new(tx),
  )
  .with_registry(Arc::new(ExecutionRegistry::new()));

  Harness {
    executor: Arc::new(executor),
    provider,
    runs,
    events,
  }
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
  let mut drained = Vec::new();
  while let Ok(event) = events.try_recv() {
    drained.push(event);
  }
  drained
}

/// A [`FlowState`] that logs every applied write with the flow that was
/// open when it landed.
pub struct RecordingState {
  active: Mutex<Option<String>>,
  flow: Mutex<Flow>,
  writes: Mutex<Vec<(String, Vec<Node>)>>,
}

impl RecordingState {
  pub fn new(flow_id: &str, flow: Flow) -> Arc<Self> {
    Arc::new(Self {
      active: Mutex::new(Some(flow_id.to_string())),
      flow: Mutex::new(flow),
      writes: Mutex::new(Vec::new()),
    })
  }

  pub fn switch_to(&self, flow_id: &str, flow: Flow) {
    *self.active.lock().unwrap() = Some(flow_id.to_string());
    *self.flow.lock().unwrap() = flow;
  }

  /// Flow ids that were open when each write landed.
  pub fn writes_while(&self, flow_id: &str) -> usize {
    self
      .writes
      .lock()
      .unwrap()
      .iter()
      .filter(|(open, _)| open == flow_id)
      .count()
  }

  pub fn flow(&self) -> Flow {
    self.flow.lock().unwrap().clone()
  }
}

impl FlowState for RecordingState {
  fn nodes(&self) -> Vec<Node> {
    self.flow.lock().unwrap().nodes.clone()
  }

  fn edges(&self) -> Vec<Edge> {
    self.flow.lock().unwrap().edges.clone()
  }

  fn active_flow_id(&self) -> Option<String> {
    self.active.lock().unwrap().clone()
  }

  fn update_nodes(&self, update: NodesUpdate<'_>) {
    let open = self.active_flow_id().unwrap_or_default();
    let mut flow = self.flow.lock().unwrap();
    flow.nodes = update(&flow.nodes);
    self.writes.lock().unwrap().push((open, flow.nodes.clone()));
  }
}

pub fn expect_succeeded(outcome: composer_engine::ExecutionOutcome) -> composer_engine::RunReport {
  match outcome {
    composer_engine::ExecutionOutcome::Succeeded(report) => report,
    other => panic!("expected success, got {:?}", other),
  }
}

pub fn expect_errors(outcome: composer_engine::ExecutionOutcome) -> composer_engine::RunReport {
  match outcome {
    composer_engine::ExecutionOutcome::CompletedWithErrors(report) => report,
    other => panic!("expected completion with errors, got {:?}", other),
  }
}
