//! Correlation records between local contacts and remote CardDAV resources.
//!
//! A [`Mapping`] is the single source of truth for "this remote resource is
//! this local contact". It is unique per `(connection, contact)` and per
//! `(connection, remote_uid)`, created on first export or first import, and
//! deleted together with its owning contact or connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Synchronization state of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
  /// Both sides agree as of `last_synced_at`.
  Synced,
  /// A push is outstanding (e.g. a create that has not completed).
  Pending,
  /// Both sides changed; a [`Conflict`] snapshot exists for review.
  Conflict,
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

/// Correlation of one local contact with one remote vCard resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
  pub mapping_id:    Uuid,
  pub connection_id: Uuid,
  pub contact_id:    Uuid,
  /// The vCard UID as the server last reported it. Some providers rewrite
  /// the UID of freshly created resources; the correlation rules recover
  /// from that via `remote_href`.
  pub remote_uid:    String,
  /// Resource locator (href) on the server, relative to the server root.
  pub remote_href:   String,
  /// Last known entity tag. `None` only when the server did not return one.
  pub etag:          Option<String>,
  pub status:        MappingStatus,

  /// Content hash of the last local representation we synced. Hashes, not
  /// timestamps, are authoritative for "did content actually change".
  pub local_hash:  Option<String>,
  /// Content hash of the last remote representation we saw.
  pub remote_hash: Option<String>,

  pub last_local_change:  Option<DateTime<Utc>>,
  pub last_remote_change: Option<DateTime<Utc>>,
  pub last_synced_at:     Option<DateTime<Utc>>,
}

impl Mapping {
  /// A fresh `Synced` mapping as written after a successful export or
  /// import.
  pub fn synced(
    connection_id: Uuid,
    contact_id: Uuid,
    remote_uid: impl Into<String>,
    remote_href: impl Into<String>,
    etag: Option<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      mapping_id: Uuid::new_v4(),
      connection_id,
      contact_id,
      remote_uid: remote_uid.into(),
      remote_href: remote_href.into(),
      etag,
      status: MappingStatus::Synced,
      local_hash: None,
      remote_hash: None,
      last_local_change: None,
      last_remote_change: None,
      last_synced_at: Some(now),
    }
  }
}

// ─── Conflict ────────────────────────────────────────────────────────────────

/// Immutable snapshot of both serialized representations, taken when both
/// sides changed since the last successful sync. Removed only by an explicit
/// keep-local / keep-remote resolution — never auto-resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
  pub conflict_id:   Uuid,
  pub mapping_id:    Uuid,
  pub connection_id: Uuid,
  pub contact_id:    Uuid,
  /// vCard text of the local contact at detection time.
  pub local_snapshot:  String,
  /// vCard text of the remote resource at detection time.
  pub remote_snapshot: String,
  /// Etag of the remote resource the snapshot was taken from.
  pub remote_etag: Option<String>,
  pub detected_at: DateTime<Utc>,
}

/// The two whole-record resolution choices. Field-level merging is
/// deliberately not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
  KeepLocal,
  KeepRemote,
}

// ─── Pending import ──────────────────────────────────────────────────────────

/// A remote contact with no local correlation, held for user review before
/// merging. Deduplicated by `(connection, remote_uid)` so repeated pulls
/// never queue it twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingImport {
  pub import_id:     Uuid,
  pub connection_id: Uuid,
  pub remote_uid:    String,
  pub remote_href:   String,
  pub etag:          Option<String>,
  /// Raw vCard text as fetched; parsed again on accept.
  pub payload:      String,
  /// Best-effort display name extracted at pull time, for review listings.
  pub display_name: Option<String>,
  pub created_at:   DateTime<Utc>,
}
