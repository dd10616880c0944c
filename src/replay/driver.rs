//! Replay driver for queued operations.
//!
//! Walks the queue in enqueue order, applies each eligible operation through a
//! [`RemoteApplier`], and records the outcome back into the queue. Delivery
//! is at-least-once: a crash between a successful apply and the removal of
//! the operation replays it again later.
//!
//! Passes over one store never overlap. Each pass holds the store's replay
//! lock, so an operation still `SYNCING` when a pass starts was abandoned by
//! an earlier pass (a storage error after the apply, a dropped future, a
//! crash) and is turned back into a failed attempt before anything else.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::backoff::Backoff;
use crate::error::{ApplyError, Error, Result};
use crate::kv::KeyValueStore;
use crate::queue::{OfflineQueueStore, Operation, OperationKind, OperationState};

/// Applies a queued operation against the authoritative remote store.
#[async_trait]
pub trait RemoteApplier: Send + Sync {
  async fn apply(&self, operation: &Operation) -> std::result::Result<(), ApplyError>;
}

/// Configuration for the replay driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
  /// Attempts per operation before it is marked exhausted
  pub max_attempts: u32,
  /// Delay after the first failure; doubles on each further failure
  pub base_backoff_secs: u64,
  /// Upper bound for the backoff delay
  pub max_backoff_secs: u64,
  /// End the pass at the first failed operation
  pub stop_on_error: bool,
  /// Report what would be attempted without applying anything
  #[serde(skip)]
  pub dry_run: bool,
}

impl Default for ReplayConfig {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      base_backoff_secs: 2,
      max_backoff_secs: 300,
      stop_on_error: false,
      dry_run: false,
    }
  }
}

impl ReplayConfig {
  pub fn backoff(&self) -> Backoff {
    Backoff::new(
      Duration::from_secs(self.base_backoff_secs),
      Duration::from_secs(self.max_backoff_secs),
    )
  }
}

/// Why an operation was not attempted in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  /// Still inside its backoff window
  BackingOff { until: Option<DateTime<Utc>> },
  /// Another attempt is in flight
  InFlight,
  /// Waiting for an operator after giving up
  Exhausted,
  /// An earlier operation on the same target did not succeed
  TargetBlocked,
  /// Removed from the queue while it was being applied
  Discarded,
  /// Dry run: would have been applied
  DryRun,
}

/// What happened to one operation during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
  /// Applied and removed from the queue
  Applied,
  /// Failed; will be retried after backoff
  Failed(ApplyError),
  /// Failed for the last time
  Exhausted(ApplyError),
  Skipped(SkipReason),
}

/// Result of handling a single operation.
#[derive(Debug, Clone)]
pub struct OperationReport {
  pub id: String,
  pub kind: OperationKind,
  pub target: String,
  pub outcome: ReplayOutcome,
}

/// Result of one replay pass.
#[derive(Debug, Default)]
pub struct ReplayReport {
  pub succeeded: usize,
  pub failed: usize,
  pub exhausted: usize,
  pub skipped: usize,
  pub results: Vec<OperationReport>,
}

impl ReplayReport {
  pub fn empty() -> Self {
    Self::default()
  }

  /// Add a result.
  pub fn add(&mut self, report: OperationReport) {
    match report.outcome {
      ReplayOutcome::Applied => self.succeeded += 1,
      ReplayOutcome::Failed(_) => self.failed += 1,
      ReplayOutcome::Exhausted(_) => self.exhausted += 1,
      ReplayOutcome::Skipped(_) => self.skipped += 1,
    }
    self.results.push(report);
  }

  /// Check if no attempted operation failed.
  pub fn all_succeeded(&self) -> bool {
    self.failed == 0 && self.exhausted == 0
  }

  /// Get total operations processed.
  pub fn total(&self) -> usize {
    self.succeeded + self.failed + self.exhausted + self.skipped
  }
}

/// Drives queued operations to the remote in order.
pub struct ReplayDriver<S: KeyValueStore, A: RemoteApplier> {
  store: Arc<OfflineQueueStore<S>>,
  applier: A,
  config: ReplayConfig,
}

impl<S: KeyValueStore, A: RemoteApplier> ReplayDriver<S, A> {
  /// Create a driver with the default config.
  pub fn new(store: Arc<OfflineQueueStore<S>>, applier: A) -> Self {
    Self::with_config(store, applier, ReplayConfig::default())
  }

  /// Create a driver with a custom config.
  pub fn with_config(store: Arc<OfflineQueueStore<S>>, applier: A, config: ReplayConfig) -> Self {
    Self {
      store,
      applier,
      config,
    }
  }

  pub fn config(&self) -> &ReplayConfig {
    &self.config
  }

  /// Run one pass over the queue now.
  pub async fn run(&self) -> Result<ReplayReport> {
    self.run_at(Utc::now()).await
  }

  /// Run one pass, judging backoff windows against `now`.
  ///
  /// # Errors
  ///
  /// Returns an error if the queue cannot be read or updated. Remote
  /// failures are recorded in the report, not returned.
  #[instrument(skip(self))]
  pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ReplayReport> {
    let _replay = self.store.lock_replay().await;
    if !self.config.dry_run {
      self.store.fail_syncing().await?;
    }

    let queue = self.store.list_pending().await?;
    let backoff = self.config.backoff();
    let mut blocked: HashSet<String> = HashSet::new();
    let mut report = ReplayReport::empty();

    for operation in queue {
      let outcome = if blocked.contains(&operation.target) {
        ReplayOutcome::Skipped(SkipReason::TargetBlocked)
      } else {
        match operation.state {
          OperationState::Exhausted => ReplayOutcome::Skipped(SkipReason::Exhausted),
          OperationState::Syncing => ReplayOutcome::Skipped(SkipReason::InFlight),
          OperationState::Failed if !backoff.is_due(&operation, now) => {
            ReplayOutcome::Skipped(SkipReason::BackingOff {
              until: backoff.next_attempt_at(&operation),
            })
          }
          _ if self.config.dry_run => ReplayOutcome::Skipped(SkipReason::DryRun),
          _ => self.replay_one(&operation).await?,
        }
      };

      let failed = matches!(
        outcome,
        ReplayOutcome::Failed(_) | ReplayOutcome::Exhausted(_)
      );
      let proceeds = matches!(
        outcome,
        ReplayOutcome::Applied | ReplayOutcome::Skipped(SkipReason::DryRun | SkipReason::Discarded)
      );
      if !proceeds {
        debug!(id = %operation.id, target = %operation.target, ?outcome, "target blocked for this pass");
        blocked.insert(operation.target.clone());
      }

      report.add(OperationReport {
        id: operation.id,
        kind: operation.kind,
        target: operation.target,
        outcome,
      });

      if failed && self.config.stop_on_error {
        break;
      }
    }

    info!(
      succeeded = report.succeeded,
      failed = report.failed,
      exhausted = report.exhausted,
      skipped = report.skipped,
      "replay pass finished"
    );
    Ok(report)
  }

  /// Attempt a single operation and record the result in the queue.
  async fn replay_one(&self, operation: &Operation) -> Result<ReplayOutcome> {
    let attempt = match self.store.begin_sync(&operation.id).await {
      Ok(op) => op,
      Err(Error::NotQueued { .. }) => return Ok(ReplayOutcome::Skipped(SkipReason::Discarded)),
      Err(Error::InvalidTransition { .. }) => {
        return Ok(ReplayOutcome::Skipped(SkipReason::InFlight))
      }
      Err(e) => return Err(e),
    };

    match self.applier.apply(&attempt).await {
      Ok(()) => {
        self.store.remove(&attempt.id).await?;
        debug!(id = %attempt.id, "operation applied");
        Ok(ReplayOutcome::Applied)
      }
      Err(error) => {
        let max_attempts = self.config.max_attempts.max(1);
        let give_up = error.is_permanent() || attempt.retry_count.saturating_add(1) >= max_attempts;
        let message = error.to_string();

        let recorded = if give_up {
          self.store.mark_exhausted(&attempt.id, &message).await
        } else {
          self.store.mark_failed(&attempt.id, &message).await
        };

        match recorded {
          Ok(op) => {
            warn!(
              id = %op.id,
              target = %op.target,
              retry_count = op.retry_count,
              error = %message,
              "replay attempt failed"
            );
            if give_up {
              Ok(ReplayOutcome::Exhausted(error))
            } else {
              Ok(ReplayOutcome::Failed(error))
            }
          }
          Err(Error::NotQueued { .. }) => Ok(ReplayOutcome::Skipped(SkipReason::Discarded)),
          Err(e) => Err(e),
        }
      }
    }
  }
}
