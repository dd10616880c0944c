//! Subcommands of the offq binary.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};

use offq::config::Config;
use offq::replay::{ReplayOutcome, ReplayReport, SkipReason};
use offq::{
  ApplyError, KeyValueStore, OfflineQueueStore, Operation, OperationKind, OperationState,
  QueueStats, RemoteApplier, ReplayConfig, ReplayDriver,
};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Queue an operation (kind: create, update, delete, query)
  Enqueue {
    kind: OperationKind,
    target: String,
    /// JSON payload
    #[arg(default_value = "null")]
    payload: String,
  },
  /// List queued operations in replay order
  List {
    /// Only show operations in this state
    #[arg(long)]
    state: Option<OperationState>,
  },
  /// Show a single operation
  Show { id: String },
  /// Print the number of pending operations
  Count,
  /// Show per-state counts
  Stats,
  /// Discard an operation
  Remove { id: String },
  /// Discard every queued operation
  Clear {
    /// Confirm the reset
    #[arg(long)]
    yes: bool,
  },
  /// Make operations stuck mid-replay retryable again
  Recover,
  /// Show what the next replay pass would attempt
  Plan,
  /// Manage the response cache
  #[command(subcommand)]
  Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Store a JSON value
  Put { key: String, value: String },
  /// Print a cached value
  Get { key: String },
  /// Forget a cached value
  Remove { key: String },
  /// Forget every cached value
  Clear,
}

/// Stand-in remote for planning; never reached in a dry run.
struct NoRemote;

#[async_trait]
impl RemoteApplier for NoRemote {
  async fn apply(&self, _operation: &Operation) -> std::result::Result<(), ApplyError> {
    Err(ApplyError::Unavailable("no remote configured".to_string()))
  }
}

/// Execute a command and return the text to print.
pub async fn run<S: KeyValueStore>(
  store: &Arc<OfflineQueueStore<S>>,
  config: &Config,
  command: Command,
  json: bool,
) -> Result<String> {
  match command {
    Command::Enqueue {
      kind,
      target,
      payload,
    } => {
      let payload = parse_json(&payload)?;
      let op = store.enqueue(kind, &target, payload).await?;
      if json {
        return Ok(serde_json::to_string_pretty(&op)?);
      }
      Ok(op.id)
    }
    Command::List { state } => {
      let ops = match state {
        Some(state) => store.list_by_state(state).await?,
        None => store.list_pending().await?,
      };
      if json {
        return Ok(serde_json::to_string_pretty(&ops)?);
      }
      if ops.is_empty() {
        return Ok("Queue is empty".to_string());
      }
      Ok(
        ops
          .iter()
          .map(format_operation)
          .collect::<Vec<_>>()
          .join("\n"),
      )
    }
    Command::Show { id } => {
      let op = store
        .get(&id)
        .await?
        .ok_or_else(|| eyre!("No queued operation with id {}", id))?;
      Ok(serde_json::to_string_pretty(&op)?)
    }
    Command::Count => Ok(store.count_pending().await?.to_string()),
    Command::Stats => {
      let stats = store.stats().await?;
      if json {
        return Ok(serde_json::to_string_pretty(&stats_json(&stats))?);
      }
      Ok(format_stats(&stats))
    }
    Command::Remove { id } => {
      if store.remove(&id).await? {
        Ok(format!("Removed {}", id))
      } else {
        Ok(format!("No queued operation with id {}", id))
      }
    }
    Command::Clear { yes } => {
      if !yes {
        return Err(eyre!("Refusing to clear the queue without --yes"));
      }
      store.clear().await?;
      Ok("Queue cleared".to_string())
    }
    Command::Recover => {
      let recovered = store.recover_interrupted().await?;
      Ok(format!("Recovered {} interrupted operation(s)", recovered))
    }
    Command::Plan => {
      let config = ReplayConfig {
        dry_run: true,
        ..config.replay.clone()
      };
      let driver = ReplayDriver::with_config(Arc::clone(store), NoRemote, config);
      let report = driver.run().await?;
      Ok(format_plan(&report))
    }
    Command::Cache(cmd) => run_cache(store, cmd).await,
  }
}

async fn run_cache<S: KeyValueStore>(
  store: &OfflineQueueStore<S>,
  command: CacheCommand,
) -> Result<String> {
  match command {
    CacheCommand::Put { key, value } => {
      store.cache_put(&key, parse_json(&value)?).await?;
      Ok(String::new())
    }
    CacheCommand::Get { key } => match store.cache_get(&key).await? {
      Some(value) => Ok(serde_json::to_string_pretty(&value)?),
      None => Err(eyre!("Nothing cached under '{}'", key)),
    },
    CacheCommand::Remove { key } => {
      store.cache_remove(&key).await?;
      Ok(String::new())
    }
    CacheCommand::Clear => {
      store.cache_clear().await?;
      Ok(String::new())
    }
  }
}

fn parse_json(raw: &str) -> Result<Value> {
  serde_json::from_str(raw).map_err(|e| eyre!("Invalid JSON '{}': {}", raw, e))
}

fn format_operation(op: &Operation) -> String {
  let mut line = format!(
    "{}  {:<9}  {:<6}  {:<12}  retries={}  {}",
    op.id,
    op.state,
    op.kind,
    op.target,
    op.retry_count,
    op.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
  );
  if let Some(error) = &op.last_error {
    line.push_str(&format!("  ({})", error));
  }
  line
}

fn format_stats(stats: &QueueStats) -> String {
  let mut lines = vec![
    format!("pending:   {}", stats.pending),
    format!("syncing:   {}", stats.syncing),
    format!("failed:    {}", stats.failed),
    format!("exhausted: {}", stats.exhausted),
  ];
  if let Some(oldest) = stats.oldest_pending {
    lines.push(format!("oldest pending: {}", oldest.to_rfc3339()));
  }
  lines.join("\n")
}

fn stats_json(stats: &QueueStats) -> Value {
  json!({
    "pending": stats.pending,
    "syncing": stats.syncing,
    "failed": stats.failed,
    "exhausted": stats.exhausted,
    "oldestPending": stats.oldest_pending.map(|t| t.to_rfc3339()),
  })
}

fn format_plan(report: &ReplayReport) -> String {
  if report.results.is_empty() {
    return "Nothing to replay".to_string();
  }

  report
    .results
    .iter()
    .map(|r| {
      let action = match &r.outcome {
        ReplayOutcome::Skipped(SkipReason::DryRun) => "apply".to_string(),
        ReplayOutcome::Skipped(SkipReason::BackingOff { until: Some(at) }) => {
          format!("wait until {}", at.format("%Y-%m-%d %H:%M:%S"))
        }
        ReplayOutcome::Skipped(SkipReason::BackingOff { until: None }) => "wait".to_string(),
        ReplayOutcome::Skipped(SkipReason::InFlight) => "in flight".to_string(),
        ReplayOutcome::Skipped(SkipReason::Exhausted) => "needs operator".to_string(),
        ReplayOutcome::Skipped(SkipReason::TargetBlocked) => "blocked by earlier operation".to_string(),
        other => format!("{:?}", other),
      };
      format!("{}  {:<6}  {:<12}  {}", r.id, r.kind, r.target, action)
    })
    .collect::<Vec<_>>()
    .join("\n")
}
