//! The remote-operation error taxonomy shared by the protocol client and
//! the sync engine.

use thiserror::Error;

// ─── Remote-operation taxonomy ───────────────────────────────────────────────

/// Classified failure of a remote (CardDAV) operation.
///
/// The variant decides the engine's reaction: `Transient` is retried with
/// bounded backoff; `NotFound`, `Malformed` and `EtagMismatch` fail the one
/// item they concern; everything else aborts the pass.
#[derive(Debug, Error)]
pub enum RemoteError {
  /// No usable connection or address book; fatal for the pass, no retry.
  #[error("configuration error: {0}")]
  Config(String),

  /// Timeout, connection reset, throttling, or 5xx — worth retrying.
  #[error("transient network error: {0}")]
  Transient(String),

  /// 401/403; fatal, no retry, surfaced as its own user-facing category.
  #[error("authentication failed: {0}")]
  Auth(String),

  /// 404; fatal for the affected item only.
  #[error("remote resource not found: {0}")]
  NotFound(String),

  /// Etag precondition failed on an update (HTTP 412). The engine never
  /// force-overwrites past this.
  #[error("etag mismatch on {0}")]
  EtagMismatch(String),

  /// The remote payload cannot be used (no UID, unparseable vCard).
  #[error("malformed remote data: {0}")]
  Malformed(String),

  /// Anything else — non-retried, aborts the pass.
  #[error("remote error: {0}")]
  Other(String),
}

impl RemoteError {
  /// Whether the retry wrapper may re-attempt the operation.
  pub fn is_transient(&self) -> bool { matches!(self, Self::Transient(_)) }

  /// Whether the failure is scoped to a single item rather than the pass.
  pub fn is_item_scoped(&self) -> bool {
    matches!(
      self,
      Self::NotFound(_) | Self::EtagMismatch(_) | Self::Malformed(_)
    )
  }
}
