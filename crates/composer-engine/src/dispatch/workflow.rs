//! Model calls.
//!
//! A workflow node moves through: prepare inputs, normalize, authorize, cache
//! lookup, then (on a miss) a run record that goes `pending -> running ->
//! completed | failed` around the provider call.

use async_trait::async_trait;
use composer_flow::{Node, NodeKind, WorkflowData};
use composer_provider::{ProviderRequest, ProviderResult};
use composer_store::{NewRun, RunStatus, input_hash};
use tracing::{debug, info, warn};

use super::{DispatchContext, NodeHandler, NodeOutcome, extract_output};
use crate::error::ExecutionError;
use crate::hooks::normalize_inputs;
use crate::input::{Inputs, prepare_workflow_inputs};

#[derive(Debug, Clone, Default)]
pub struct WorkflowHandler;

#[async_trait]
impl NodeHandler for WorkflowHandler {
  async fn run(
    &self,
    node: &Node,
    inputs: Inputs,
    ctx: &DispatchContext<'_>,
  ) -> Result<NodeOutcome, ExecutionError> {
    let NodeKind::Workflow(data) = &node.kind else {
      return Ok(NodeOutcome::Empty);
    };
    run_workflow(&node.id, data, inputs, ctx).await
  }
}

async fn run_workflow(
  node_id: &str,
  data: &WorkflowData,
  collected: Inputs,
  ctx: &DispatchContext<'_>,
) -> Result<NodeOutcome, ExecutionError> {
  let caps = ctx.capabilities;
  let workflow = &data.workflow;

  let prepared = match prepare_workflow_inputs(data, collected) {
    Ok(prepared) => prepared,
    Err(message) => return Ok(NodeOutcome::Failed(message)),
  };

  let inputs = match normalize_inputs(caps.normalizer.as_ref(), ctx.flow_id, prepared).await {
    Ok(inputs) => inputs,
    Err(e) => return Ok(NodeOutcome::Failed(format!("input normalization failed: {}", e))),
  };

  if let Err(denied) = caps.guard.authorize(ctx.flow_id, workflow).await {
    return Ok(NodeOutcome::Failed(denied.to_string()));
  }

  let hash = input_hash(&inputs);
  let store_err = |source| ExecutionError::Store {
    node_id: node_id.to_string(),
    source,
  };

  if let Some(workflow_id) = workflow.id {
    if let Some(cached) = caps
      .runs
      .find_cached_run(workflow_id, &hash)
      .await
      .map_err(store_err)?
    {
      info!(
        execution_id = %ctx.execution_id,
        node_id = %node_id,
        run_id = %cached.run_id,
        "cache_hit"
      );
      return Ok(extract_output(node_id, Some(cached.output)));
    }
  }

  let run_id = caps
    .runs
    .create_run(NewRun {
      workflow_id: workflow.id,
      provider: workflow.provider,
      inputs: inputs.clone(),
      input_hash: hash,
    })
    .await
    .map_err(store_err)?;
  caps
    .runs
    .update_run(&run_id, RunStatus::Running, None, None)
    .await
    .map_err(store_err)?;

  debug!(
    node_id = %node_id,
    run_id = %run_id,
    provider = %workflow.provider,
    identifier = %workflow.identifier,
    "dispatching model call"
  );

  let called = match caps.providers.get(workflow.provider) {
    Ok(provider) => {
      provider
        .run(ProviderRequest {
          workflow_identifier: workflow.identifier.clone(),
          inputs,
        })
        .await
    }
    Err(e) => Err(e),
  };

  let result: ProviderResult = match called {
    Ok(result) => result,
    Err(source) => {
      let message = source.to_string();
      if let Err(e) = caps
        .runs
        .update_run(&run_id, RunStatus::Failed, None, Some(&message))
        .await
      {
        warn!(run_id = %run_id, error = %e, "failed to record run failure");
      }
      return Err(ExecutionError::Provider {
        node_id: node_id.to_string(),
        source,
      });
    }
  };

  if !result.success {
    let message = result
      .error
      .unwrap_or_else(|| format!("{} reported a failure", workflow.provider));
    caps
      .runs
      .update_run(&run_id, RunStatus::Failed, None, Some(&message))
      .await
      .map_err(store_err)?;
    return Ok(NodeOutcome::Failed(message));
  }

  let output = result.primary_output().cloned();
  caps
    .runs
    .update_run(&run_id, RunStatus::Completed, output.as_ref(), None)
    .await
    .map_err(store_err)?;

  Ok(extract_output(node_id, output))
}
