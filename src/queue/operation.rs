//! Operation types for the offline queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of mutation an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
  Create,
  Update,
  Delete,
  Query,
}

impl OperationKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Create => "CREATE",
      Self::Update => "UPDATE",
      Self::Delete => "DELETE",
      Self::Query => "QUERY",
    }
  }
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

impl FromStr for OperationKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "CREATE" => Ok(Self::Create),
      "UPDATE" => Ok(Self::Update),
      "DELETE" => Ok(Self::Delete),
      "QUERY" => Ok(Self::Query),
      other => Err(format!("unknown operation kind '{}'", other)),
    }
  }
}

/// Lifecycle state of a queued operation.
///
/// ```text
/// PENDING --begin--> SYNCING --ok--> (removed)
///                       |  \--fail--> FAILED --begin--> SYNCING
///                       \--give up--> EXHAUSTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
  /// Waiting for its first replay attempt
  Pending,
  /// A replay attempt is in flight
  Syncing,
  /// The last attempt failed; eligible for retry
  Failed,
  /// Retries used up or permanently rejected; waits for an operator
  Exhausted,
}

impl OperationState {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "PENDING",
      Self::Syncing => "SYNCING",
      Self::Failed => "FAILED",
      Self::Exhausted => "EXHAUSTED",
    }
  }

  /// Whether the lifecycle allows moving from `self` to `next`.
  pub fn can_transition_to(&self, next: OperationState) -> bool {
    use OperationState::*;
    matches!(
      (*self, next),
      (Pending, Syncing) | (Failed, Syncing) | (Syncing, Failed) | (Syncing, Exhausted)
    )
  }
}

impl fmt::Display for OperationState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

impl FromStr for OperationState {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "PENDING" => Ok(Self::Pending),
      "SYNCING" => Ok(Self::Syncing),
      "FAILED" => Ok(Self::Failed),
      "EXHAUSTED" => Ok(Self::Exhausted),
      other => Err(format!("unknown operation state '{}'", other)),
    }
  }
}

/// A queued mutation waiting to be replayed against the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
  /// Opaque unique id assigned at enqueue time
  pub id: String,
  pub kind: OperationKind,
  /// Logical resource or table the operation applies to
  pub target: String,
  /// Caller-defined data; the queue never inspects it
  pub payload: Value,
  pub enqueued_at: DateTime<Utc>,
  /// Number of failed replay attempts
  pub retry_count: u32,
  pub state: OperationState,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_attempt_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
}

impl Operation {
  /// Create a new pending operation stamped with the current time.
  pub fn new(id: String, kind: OperationKind, target: String, payload: Value) -> Self {
    Self {
      id,
      kind,
      target,
      payload,
      enqueued_at: Utc::now(),
      retry_count: 0,
      state: OperationState::Pending,
      last_attempt_at: None,
      last_error: None,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.state == OperationState::Pending
  }
}
