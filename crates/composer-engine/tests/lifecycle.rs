//! Run lifecycle: fatal errors, the running registry, and writes to shared
//! state after the user switches flows.

mod common;

use std::sync::Arc;

use common::*;
use composer_engine::{ExecutionError, ExecutionEvent, ExecutionOutcome, FlowState, SharedFlowState};
use composer_flow::Flow;
use composer_store::RunStatus;
use serde_json::json;
use tokio::sync::Notify;

#[tokio::test]
async fn test_provider_error_aborts_run() {
  let mut h = harness();
  h.provider.script("broken", Script::Error);
  h.provider.script("fine", Script::Succeed(json!("https://x/ok.png")));

  let flow = Flow::new(
    vec![
      primitive("p", json!("hello")),
      model("m", "broken"),
      model("n", "fine"),
      result("r"),
    ],
    vec![
      edge_to("p", "m", "prompt"),
      edge_to("p", "n", "prompt"),
      edge("m", "r"),
    ],
  );
  let state = SharedFlowState::with_open("flow-fatal", flow);

  let err = h
    .executor
    .execute("flow-fatal", &state)
    .await
    .unwrap_err();
  assert!(matches!(err, ExecutionError::Provider { ref node_id, .. } if node_id == "m"));

  // The result node never ran and nothing is left spinning.
  let shown = state.flow();
  assert!(shown.nodes.iter().all(|n| !n.status.running));
  assert!(shown.get_node("r").unwrap().status.value.is_none());
  assert!(!h.executor.registry().is_running("flow-fatal"));

  let runs = h.runs.runs();
  let broken = runs
    .iter()
    .find(|r| r.status == RunStatus::Failed)
    .unwrap();
  assert!(broken.error.as_deref().unwrap().contains("connection reset"));

  let events = drain(&mut h.events);
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::Failed { error, .. }) if error.contains("connection reset")
  ));
}

#[tokio::test]
async fn test_second_start_is_a_noop_while_running() {
  let h = harness();
  let started = Arc::new(Notify::new());
  let release = Arc::new(Notify::new());
  h.provider.script(
    "slow",
    Script::Gate {
      started: started.clone(),
      release: release.clone(),
      output: json!("https://x/slow.png"),
    },
  );

  let flow = Flow::new(vec![model("m", "slow"), result("r")], vec![edge("m", "r")]);
  let state = Arc::new(SharedFlowState::with_open("flow-busy", flow));

  let first = {
    let executor = h.executor.clone();
    let state = state.clone();
    tokio::spawn(async move { executor.execute("flow-busy", &*state).await })
  };

  started.notified().await;
  assert!(h.executor.registry().is_running("flow-busy"));

  let second = h.executor.execute("flow-busy", &*state).await.unwrap();
  assert!(matches!(second, ExecutionOutcome::AlreadyRunning));
  assert_eq!(h.provider.calls().len(), 1);

  release.notify_one();
  expect_succeeded(first.await.unwrap().unwrap());
  assert!(!h.executor.registry().is_running("flow-busy"));

  // Once finished, the flow can run again.
  h.provider.script("slow", Script::Succeed(json!("https://x/again.png")));
  let third = expect_succeeded(h.executor.execute("flow-busy", &*state).await.unwrap());
  assert_eq!(third.outputs["r"], json!("https://x/again.png"));
}

#[tokio::test]
async fn test_switching_flows_stops_shared_writes() {
  let h = harness();
  let started = Arc::new(Notify::new());
  let release = Arc::new(Notify::new());
  h.provider.script(
    "slow",
    Script::Gate {
      started: started.clone(),
      release: release.clone(),
      output: json!("https://x/a.png"),
    },
  );

  let flow_a = Flow::new(
    vec![primitive("p", json!("a cat")), model("m", "slow"), result("r")],
    vec![edge_to("p", "m", "prompt"), edge("m", "r")],
  );
  let flow_b = Flow::new(vec![result("other")], vec![]);
  let state = RecordingState::new("flow-a", flow_a);

  let run = {
    let executor = h.executor.clone();
    let state = state.clone();
    tokio::spawn(async move { executor.execute("flow-a", &*state).await })
  };

  started.notified().await;
  state.switch_to("flow-b", flow_b.clone());
  release.notify_one();

  let report = expect_succeeded(run.await.unwrap().unwrap());

  assert!(state.writes_while("flow-a") > 0);
  assert_eq!(state.writes_while("flow-b"), 0);
  assert_eq!(state.flow(), flow_b);
  assert_eq!(state.active_flow_id().as_deref(), Some("flow-b"));

  // The run's own copy saw everything.
  let r = report.snapshot.node("r").unwrap();
  assert_eq!(r.status.value, Some(json!("https://x/a.png")));
  assert!(report.snapshot.nodes().iter().all(|n| !n.status.running));
}

#[tokio::test]
async fn test_flow_that_is_not_open_does_not_run() {
  let mut h = harness();
  h.provider.script("b-model", Script::Succeed(json!("https://x/b.png")));
  h.provider.script("a-model", Script::Succeed(json!("https://x/a.png")));

  let flow_b = Flow::new(
    vec![primitive("pb", json!("a dog")), model("mb", "b-model"), result("rb")],
    vec![edge_to("pb", "mb", "prompt"), edge("mb", "rb")],
  );
  let state = RecordingState::new("flow-b", flow_b.clone());

  let outcome = h.executor.execute("flow-a", &*state).await.unwrap();
  assert!(matches!(outcome, ExecutionOutcome::NotOpen));
  assert!(outcome.report().is_none());

  // Nothing of flow B was dispatched or written under flow A's id.
  assert!(h.provider.calls().is_empty());
  assert_eq!(state.writes_while("flow-b"), 0);
  assert_eq!(state.flow(), flow_b);
  assert!(drain(&mut h.events).is_empty());
  assert!(!h.executor.registry().is_running("flow-a"));

  // Once flow A is open it runs normally.
  let flow_a = Flow::new(
    vec![primitive("pa", json!("a cat")), model("ma", "a-model"), result("ra")],
    vec![edge_to("pa", "ma", "prompt"), edge("ma", "ra")],
  );
  state.switch_to("flow-a", flow_a);
  let report = expect_succeeded(h.executor.execute("flow-a", &*state).await.unwrap());
  assert_eq!(h.provider.called(), ["a-model"]);
  assert_eq!(report.outputs["ra"], json!("https://x/a.png"));
}
