use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use composer_artifact::{FsUploader, FsUploaderConfig};
use composer_engine::{
  Capabilities, DraftSink, ExecutionOutcome, ExecutorConfig, FlowExecutor, FlowSnapshot,
  SharedFlowState, SinkError,
};
use composer_flow::{Flow, FlowError, ProviderKind};
use composer_provider::{
  EchoProvider, FalConfig, FalProvider, ProviderSet, ReplicateConfig, ReplicateProvider,
};
use composer_store::SqliteRunStore;

/// Composer - runs AI generation flows
#[derive(Parser)]
#[command(name = "composer")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.composer)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the execution levels of a flow
  Plan {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,
  },

  /// Execute a flow
  Run {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// Flow id for run tracking (default: the file stem)
    #[arg(long)]
    flow_id: Option<String>,

    /// Echo inputs back instead of calling providers
    #[arg(long)]
    dry_run: bool,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".composer"),
  };

  match cli.command {
    Some(Commands::Plan { flow_file }) => plan(&flow_file)?,
    Some(Commands::Run {
      flow_file,
      flow_id,
      dry_run,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_flow(flow_file, flow_id, dry_run, data_dir))?;
    }
    None => {
      println!("composer - use --help to see available commands");
    }
  }

  Ok(())
}

fn read_flow(flow_file: &Path) -> Result<Flow> {
  let content = std::fs::read_to_string(flow_file)
    .with_context(|| format!("failed to read flow file: {}", flow_file.display()))?;
  Flow::from_json(&content)
    .with_context(|| format!("failed to parse flow file: {}", flow_file.display()))
}

fn plan(flow_file: &Path) -> Result<()> {
  let flow = read_flow(flow_file)?;
  if let Err(e) = flow.validate() {
    eprintln!("warning: {}", e);
  }

  for (depth, level) in flow.levels().iter().enumerate() {
    let ids: Vec<String> = level
      .iter()
      .map(|n| format!("{} ({})", n.id, n.tag()))
      .collect();
    println!("level {}: {}", depth, ids.join(", "));
  }
  Ok(())
}

/// Reject flows the executor cannot run. Cycles only warn: their members are
/// left out of the levels and the rest of the flow still runs.
fn check_runnable(flow: &Flow) -> Result<()> {
  match flow.validate() {
    Ok(()) => Ok(()),
    Err(e @ FlowError::Cycle { .. }) => {
      eprintln!("warning: {}", e);
      Ok(())
    }
    Err(e) => Err(e).context("invalid flow"),
  }
}

fn providers(dry_run: bool) -> ProviderSet {
  if dry_run {
    return ProviderSet::uniform(Arc::new(EchoProvider::new(ProviderKind::Replicate)));
  }

  let mut set = ProviderSet::new();
  if let Ok(token) = std::env::var("REPLICATE_API_TOKEN") {
    set = set.with(Arc::new(ReplicateProvider::new(ReplicateConfig::new(token))));
  }
  if let Ok(key) = std::env::var("FAL_KEY") {
    set = set.with(Arc::new(FalProvider::new(FalConfig::new(key))));
  }
  set
}

/// Writes the latest draft of each flow to `{dir}/{flow_id}.json`.
struct FileDrafts {
  dir: PathBuf,
}

#[async_trait]
impl DraftSink for FileDrafts {
  async fn save_draft(&self, flow_id: &str, snapshot: &FlowSnapshot) -> Result<(), SinkError> {
    let sink_err = |e: String| SinkError {
      message: format!("draft for {}: {}", flow_id, e),
    };
    let json =
      serde_json::to_vec_pretty(&snapshot.to_flow()).map_err(|e| sink_err(e.to_string()))?;
    tokio::fs::create_dir_all(&self.dir)
      .await
      .map_err(|e| sink_err(e.to_string()))?;
    tokio::fs::write(self.dir.join(format!("{}.json", flow_id)), json)
      .await
      .map_err(|e| sink_err(e.to_string()))
  }
}

async fn run_flow(
  flow_file: PathBuf,
  flow_id: Option<String>,
  dry_run: bool,
  data_dir: PathBuf,
) -> Result<()> {
  let flow = read_flow(&flow_file)?;
  check_runnable(&flow)?;
  let flow_id = match flow_id {
    Some(id) => id,
    None => flow_file
      .file_stem()
      .and_then(|s| s.to_str())
      .context("cannot derive a flow id from the file name; pass --flow-id")?
      .to_string(),
  };

  eprintln!("Loaded flow {} with {} nodes", flow_id, flow.nodes.len());

  tokio::fs::create_dir_all(&data_dir)
    .await
    .with_context(|| format!("failed to create data dir: {}", data_dir.display()))?;

  let pool = SqlitePoolOptions::new()
    .connect_with(
      SqliteConnectOptions::new()
        .filename(data_dir.join("runs.db"))
        .create_if_missing(true),
    )
    .await
    .context("failed to open run database")?;
  let runs = SqliteRunStore::new(pool);
  runs.migrate().await.context("failed to migrate run database")?;

  let artifacts_dir = data_dir.join("artifacts");
  let uploader = FsUploader::new(FsUploaderConfig {
    public_base: format!("file://{}", artifacts_dir.display()),
    root: artifacts_dir,
  });

  let capabilities = Capabilities::new(providers(dry_run), Arc::new(runs))
    .with_uploader(Arc::new(uploader))
    .with_drafts(Arc::new(FileDrafts {
      dir: data_dir.join("drafts"),
    }));
  let executor = FlowExecutor::new(ExecutorConfig::default(), capabilities);

  let state = SharedFlowState::with_open(flow_id.clone(), flow);
  let outcome = executor
    .execute(&flow_id, &state)
    .await
    .context("flow execution failed")?;

  let report = match outcome {
    ExecutionOutcome::AlreadyRunning => bail!("flow {} is already running", flow_id),
    ExecutionOutcome::NotOpen => bail!("flow {} is not open", flow_id),
    ExecutionOutcome::Succeeded(report) | ExecutionOutcome::CompletedWithErrors(report) => report,
  };

  eprintln!("Execution completed: {}", report.execution_id);
  if let Some(example) = &report.example {
    eprintln!("Example output: {}", example.url);
  }

  // Print final node statuses as JSON
  let mut statuses = serde_json::Map::new();
  for node in report.snapshot.nodes() {
    statuses.insert(node.id.clone(), serde_json::to_value(&node.status)?);
  }
  println!("{}", serde_json::to_string_pretty(&statuses)?);

  if !report.failed.is_empty() {
    bail!("flow completed with errors in: {}", report.failed.join(", "));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use composer_flow::{CombineData, Edge, Node, NodeKind};

  fn node(id: &str) -> Node {
    Node::new(id, NodeKind::CombineText(CombineData::default()))
  }

  #[test]
  fn test_repeated_node_ids_are_rejected() {
    let flow = Flow::new(
      vec![node("a"), node("a"), node("b")],
      vec![Edge::new("e1", "a", "b")],
    );
    let err = check_runnable(&flow).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<FlowError>(),
      Some(FlowError::DuplicateNode(id)) if id == "a"
    ));
  }

  #[test]
  fn test_cycles_are_runnable() {
    let flow = Flow::new(
      vec![node("a"), node("b"), node("c")],
      vec![Edge::new("e1", "b", "c"), Edge::new("e2", "c", "b")],
    );
    assert!(check_runnable(&flow).is_ok());
  }
}
