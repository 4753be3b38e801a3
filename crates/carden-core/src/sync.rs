//! Sync pass results and progress reporting.

use serde::{Deserialize, Serialize};

// ─── Result counters ─────────────────────────────────────────────────────────

/// Aggregated outcome of a sync pass (or one phase of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
  /// Remote contacts queued for user review.
  pub pending_imports:  usize,
  /// Local contacts newly created on the server.
  pub exported:         usize,
  /// Local contacts overwritten from the remote side.
  pub updated_locally:  usize,
  /// Remote resources overwritten from the local side.
  pub updated_remotely: usize,
  /// Conflict snapshots recorded.
  pub conflicts:        usize,
  /// Per-item errors (the pass itself still completed).
  pub errors:           usize,
  /// Human-readable messages for the per-item errors, in occurrence order.
  pub messages:         Vec<String>,
}

impl SyncResult {
  /// Fold another phase's counters into this one.
  pub fn merge(&mut self, other: SyncResult) {
    self.pending_imports += other.pending_imports;
    self.exported += other.exported;
    self.updated_locally += other.updated_locally;
    self.updated_remotely += other.updated_remotely;
    self.conflicts += other.conflicts;
    self.errors += other.errors;
    self.messages.extend(other.messages);
  }

  /// Record one item-scoped failure.
  pub fn record_error(&mut self, message: impl Into<String>) {
    self.errors += 1;
    self.messages.push(message.into());
  }
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// Which part of the pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
  Discover,
  Pull,
  Push,
}

impl std::fmt::Display for SyncPhase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Discover => write!(f, "discover"),
      Self::Pull => write!(f, "pull"),
      Self::Push => write!(f, "push"),
    }
  }
}

/// Advisory progress event emitted during long passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
  pub phase:   SyncPhase,
  /// 1-based position within the phase; 0 at phase start.
  pub current: usize,
  pub total:   usize,
  /// Human-readable label of the item in flight, if any.
  pub label:   Option<String>,
}

/// Observer for [`Progress`] events. Implementations must not block.
pub trait ProgressSink: Send + Sync {
  fn progress(&self, event: &Progress);
}

/// Sink that discards all events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
  fn progress(&self, _event: &Progress) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merge_sums_counters_and_concatenates_messages() {
    let mut a = SyncResult {
      pending_imports: 1,
      updated_locally: 2,
      ..SyncResult::default()
    };
    a.record_error("left");

    let mut b = SyncResult {
      exported: 3,
      updated_remotely: 1,
      conflicts: 1,
      ..SyncResult::default()
    };
    b.record_error("right");

    a.merge(b);
    assert_eq!(a.pending_imports, 1);
    assert_eq!(a.exported, 3);
    assert_eq!(a.updated_locally, 2);
    assert_eq!(a.updated_remotely, 1);
    assert_eq!(a.conflicts, 1);
    assert_eq!(a.errors, 2);
    assert_eq!(a.messages, vec!["left".to_string(), "right".to_string()]);
  }
}
