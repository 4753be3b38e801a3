//! Connection — per-server sync configuration and health markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What to do with remote contacts that have no local correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
  /// Queue a pending-import record for user review (the default).
  #[default]
  Review,
  /// Ignore unmatched remote contacts entirely.
  Off,
}

/// One configured CardDAV server for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
  pub connection_id: Uuid,
  pub owner_id:      Uuid,

  pub server_url: String,
  pub username:   String,
  pub password:   String,

  /// Master toggle; a disabled connection refuses to start a pass.
  pub sync_enabled:    bool,
  /// When `false`, the push phase skips exporting contacts that have no
  /// mapping yet (existing mappings still push updates).
  pub auto_export_new: bool,
  /// Advisory scheduling hint for the surrounding scheduler; the engine
  /// itself never sleeps on it.
  pub sync_interval_minutes: u32,
  pub import_mode: ImportMode,

  pub last_error:     Option<String>,
  pub last_error_at:  Option<DateTime<Utc>>,
  pub last_synced_at: Option<DateTime<Utc>>,
}

impl Connection {
  pub fn new(owner_id: Uuid, server_url: impl Into<String>) -> Self {
    Self {
      connection_id: Uuid::new_v4(),
      owner_id,
      server_url: server_url.into(),
      username: String::new(),
      password: String::new(),
      sync_enabled: true,
      auto_export_new: true,
      sync_interval_minutes: 60,
      import_mode: ImportMode::default(),
      last_error: None,
      last_error_at: None,
      last_synced_at: None,
    }
  }
}
