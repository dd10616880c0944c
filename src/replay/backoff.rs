//! Exponential backoff between replay attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::queue::Operation;

/// Doubling delay schedule: `base * 2^(retries - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  base: Duration,
  max: Duration,
}

impl Backoff {
  pub fn new(base: Duration, max: Duration) -> Self {
    Self { base, max }
  }

  /// Delay to wait after `retry_count` failed attempts.
  pub fn delay(&self, retry_count: u32) -> Duration {
    if retry_count == 0 {
      return Duration::ZERO;
    }
    let exponent = (retry_count - 1).min(31);
    self
      .base
      .checked_mul(1u32 << exponent)
      .map_or(self.max, |d| d.min(self.max))
  }

  /// Earliest time the operation may be attempted again, if it was ever
  /// attempted.
  pub fn next_attempt_at(&self, op: &Operation) -> Option<DateTime<Utc>> {
    let last = op.last_attempt_at?;
    let delay = chrono::Duration::from_std(self.delay(op.retry_count)).ok()?;
    last.checked_add_signed(delay)
  }

  /// Whether the operation's backoff window has elapsed at `now`.
  pub fn is_due(&self, op: &Operation, now: DateTime<Utc>) -> bool {
    match op.last_attempt_at {
      None => true,
      Some(_) => self.next_attempt_at(op).is_some_and(|at| now >= at),
    }
  }
}
