use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use collider_config::StoreConfig;
use collider_graph::DependencyGraph;
use collider_model::{
  BatchMetadata, ExecutionState, NewSubtaskResult, ResultPlacement, SubtaskStatus,
};
use collider_store::{
  DateRange, InMemoryStore, ResultQuery, ResultStore, RetentionSweeper, SystemClock, snapshot,
};

/// Collider - inspect and maintain workflow execution results
#[derive(Parser)]
#[command(name = "collider")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.collider)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Snapshot file to operate on (default: from config, else <data-dir>/snapshot.json)
  #[arg(long, global = true)]
  snapshot: Option<PathBuf>,

  /// Log debug output to stderr
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Create and store results from a JSON file
  Import {
    /// A JSON array of results, or an object with `results`, `batches` and
    /// `executionStates`
    file: PathBuf,
  },

  /// Query stored results
  Query(QueryArgs),

  /// Print a workflow's results, dependency graph, batches and summary
  Reintegrate { workflow: String },

  /// Check a workflow's results for corruption and dangling dependencies
  Validate { workflow: String },

  /// Print a workflow's dependency graph grouped by level
  Graph { workflow: String },

  /// Remove expired results, execution states and batches
  Cleanup {
    /// Remove entries older than this RFC 3339 timestamp (default: now minus
    /// the configured max age)
    #[arg(long)]
    older_than: Option<DateTime<Utc>>,
  },

  /// Run the retention sweeper until interrupted
  Sweep,

  /// Print store statistics
  Stats,
}

#[derive(clap::Args)]
struct QueryArgs {
  #[arg(long)]
  workflow: Option<String>,
  #[arg(long)]
  subtask: Option<String>,
  #[arg(long)]
  batch: Option<String>,
  #[arg(long)]
  status: Option<SubtaskStatus>,
  #[arg(long)]
  agent: Option<String>,
  /// Earliest storage timestamp, inclusive
  #[arg(long)]
  from: Option<DateTime<Utc>>,
  /// Latest storage timestamp, inclusive
  #[arg(long)]
  to: Option<DateTime<Utc>>,
  #[arg(long)]
  offset: Option<usize>,
  /// Maximum results (default: from config)
  #[arg(long)]
  limit: Option<usize>,
}

impl QueryArgs {
  fn into_query(self, default_limit: Option<usize>) -> ResultQuery {
    let date_range = match (self.from, self.to) {
      (None, None) => None,
      (from, to) => Some(DateRange::new(
        from.unwrap_or(DateTime::<Utc>::MIN_UTC),
        to.unwrap_or(DateTime::<Utc>::MAX_UTC),
      )),
    };

    ResultQuery {
      workflow_id: self.workflow,
      subtask_id: self.subtask,
      batch_id: self.batch,
      status: self.status,
      agent_id: self.agent,
      date_range,
      offset: self.offset,
      limit: self.limit.or(default_limit),
    }
  }
}

/// One result to import: the producer's fields plus its placement.
#[derive(Deserialize)]
struct ImportRecord {
  #[serde(flatten)]
  result: NewSubtaskResult,
  #[serde(flatten)]
  placement: ResultPlacement,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
  Results(Vec<ImportRecord>),
  Bundle(ImportBundle),
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImportBundle {
  results: Vec<ImportRecord>,
  batches: Vec<BatchMetadata>,
  execution_states: Vec<ExecutionState>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportedResult {
  subtask_id: String,
  workflow_id: String,
  execution_order: u64,
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".collider"),
  };

  let config_path = data_dir.join("config.json");
  let config = StoreConfig::load_or_default(&config_path)
    .with_context(|| format!("failed to load config: {}", config_path.display()))?;

  let snapshot_path = cli
    .snapshot
    .or_else(|| config.snapshot_path.clone())
    .unwrap_or_else(|| data_dir.join("snapshot.json"));

  let Some(command) = cli.command else {
    println!("collider - use --help to see available commands");
    return Ok(ExitCode::SUCCESS);
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(command, config, snapshot_path))
}

fn init_tracing(verbose: bool) {
  let level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

async fn run(command: Commands, config: StoreConfig, snapshot_path: PathBuf) -> Result<ExitCode> {
  let store = open_store(&snapshot_path)?;

  match command {
    Commands::Import { file } => {
      let imported = import(&*store, &file).await?;
      save_store(&store, &snapshot_path)?;
      print_json(&imported)?;
    }
    Commands::Query(args) => {
      let query = args.into_query(config.default_query_limit);
      let backend: &dyn ResultStore = &*store;
      let results = backend.query(&query).await?;
      print_json(&results)?;
    }
    Commands::Reintegrate { workflow } => {
      let backend: &dyn ResultStore = &*store;
      let data = backend.get_reintegration_data(&workflow).await?;
      print_json(&data)?;
    }
    Commands::Validate { workflow } => {
      let violations = store.integrity_report(&workflow);
      let valid = violations.is_empty();
      print_json(&json!({ "workflowId": workflow, "valid": valid, "violations": violations }))?;
      if !valid {
        return Ok(ExitCode::FAILURE);
      }
    }
    Commands::Graph { workflow } => {
      let data = store.get_reintegration_data(&workflow);
      let graph = DependencyGraph::new(&data.dependency_graph);

      let mut join_points: Vec<&String> = graph.join_points().iter().collect();
      join_points.sort();

      print_json(&json!({
        "workflowId": workflow,
        "roots": graph.roots(),
        "joinPoints": join_points,
        "levels": graph.levels(),
        "nodes": graph.nodes(),
      }))?;
    }
    Commands::Cleanup { older_than } => {
      let cutoff = match older_than {
        Some(cutoff) => cutoff,
        None => sweeper(&store, &config).cutoff(),
      };
      let report = store.cleanup_report(cutoff);
      save_store(&store, &snapshot_path)?;
      print_json(&json!({ "cutoff": cutoff, "removed": report.total(), "report": report }))?;
    }
    Commands::Sweep => {
      let cancel = CancellationToken::new();
      let mut handle = tokio::spawn(sweeper(&store, &config).run(cancel.clone()));

      let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
          result.context("failed to listen for ctrl-c")?;
          true
        }
        joined = &mut handle => {
          joined.context("retention sweeper panicked")?;
          false
        }
      };

      if interrupted {
        info!("interrupted, stopping sweeper");
        cancel.cancel();
        handle.await.context("retention sweeper panicked")?;
      }

      save_store(&store, &snapshot_path)?;
      print_json(&store.statistics())?;
    }
    Commands::Stats => {
      print_json(&store.statistics())?;
    }
  }

  Ok(ExitCode::SUCCESS)
}

/// Load the store from its snapshot file; a missing file is an empty store.
fn open_store(path: &Path) -> Result<Arc<InMemoryStore>> {
  if !path.exists() {
    debug!(path = %path.display(), "no snapshot, starting empty");
    return Ok(Arc::new(InMemoryStore::new()));
  }

  let snapshot = snapshot::read(path)
    .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
  let store = InMemoryStore::from_snapshot(snapshot, Arc::new(SystemClock))
    .with_context(|| format!("failed to restore snapshot: {}", path.display()))?;

  Ok(Arc::new(store))
}

fn save_store(store: &InMemoryStore, path: &Path) -> Result<()> {
  snapshot::write_atomic(path, &store.snapshot())
    .with_context(|| format!("failed to write snapshot: {}", path.display()))
}

fn sweeper(store: &Arc<InMemoryStore>, config: &StoreConfig) -> RetentionSweeper {
  RetentionSweeper::new(
    store.clone(),
    config.retention.clone(),
    Arc::new(SystemClock),
  )
}

async fn import(backend: &dyn ResultStore, file: &Path) -> Result<Vec<ImportedResult>> {
  let content = tokio::fs::read_to_string(file)
    .await
    .with_context(|| format!("failed to read import file: {}", file.display()))?;

  let bundle = match serde_json::from_str::<ImportFile>(&content)
    .with_context(|| format!("failed to parse import file: {}", file.display()))?
  {
    ImportFile::Results(results) => ImportBundle {
      results,
      ..ImportBundle::default()
    },
    ImportFile::Bundle(bundle) => bundle,
  };

  for batch in bundle.batches {
    backend.save_batch_metadata(batch).await?;
  }
  for state in bundle.execution_states {
    backend.save_execution_state(state).await?;
  }

  let mut imported = Vec::with_capacity(bundle.results.len());
  for record in bundle.results {
    let subtask_id = record.result.subtask_id.clone();
    let result = backend
      .create_result(record.result, record.placement)
      .await
      .with_context(|| format!("invalid result '{}'", subtask_id))?;

    imported.push(ImportedResult {
      subtask_id: result.subtask_id.clone(),
      workflow_id: result.workflow_id.clone(),
      execution_order: result.execution_order,
    });
    backend.save_result(result).await?;
  }

  info!(count = imported.len(), "imported results");
  Ok(imported)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
