//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. The contact body is stored
//! as compact JSON with the identity columns mirrored alongside it. UUIDs are
//! stored as hyphenated lowercase strings.

use carden_core::{
  connection::{Connection, ImportMode},
  contact::Contact,
  mapping::{Conflict, Mapping, MappingStatus, PendingImport},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> {
  dt.map(encode_dt)
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── MappingStatus
// ────────────────────────────────────────────────────────────

pub fn encode_status(s: MappingStatus) -> &'static str {
  match s {
    MappingStatus::Synced => "synced",
    MappingStatus::Pending => "pending",
    MappingStatus::Conflict => "conflict",
  }
}

pub fn decode_status(s: &str) -> Result<MappingStatus> {
  match s {
    "synced" => Ok(MappingStatus::Synced),
    "pending" => Ok(MappingStatus::Pending),
    "conflict" => Ok(MappingStatus::Conflict),
    other => Err(Error::UnknownDiscriminant {
      field: "mapping status",
      value: other.to_owned(),
    }),
  }
}

// ─── ImportMode ──────────────────────────────────────────────────────────────

pub fn encode_import_mode(m: ImportMode) -> &'static str {
  match m {
    ImportMode::Review => "review",
    ImportMode::Off => "off",
  }
}

pub fn decode_import_mode(s: &str) -> Result<ImportMode> {
  match s {
    "review" => Ok(ImportMode::Review),
    "off" => Ok(ImportMode::Off),
    other => Err(Error::UnknownDiscriminant {
      field: "import mode",
      value: other.to_owned(),
    }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `contacts` row.
pub struct RawContact {
  pub contact_id:   String,
  pub owner_id:     String,
  pub uid:          Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
  pub payload_json: String,
}

impl RawContact {
  /// Decode the JSON body, then overwrite identity fields from the columns.
  /// The columns win: `set_uid` updates only the `uid` column, so the JSON
  /// copy may be stale.
  pub fn into_contact(self) -> Result<Contact> {
    let mut contact: Contact = serde_json::from_str(&self.payload_json)?;
    contact.contact_id = decode_uuid(&self.contact_id)?;
    contact.owner_id = decode_uuid(&self.owner_id)?;
    contact.uid = self.uid;
    contact.created_at = decode_dt(&self.created_at)?;
    contact.updated_at = decode_dt(&self.updated_at)?;
    Ok(contact)
  }
}

/// Raw strings read directly from a `mappings` row.
pub struct RawMapping {
  pub mapping_id:         String,
  pub connection_id:      String,
  pub contact_id:         String,
  pub remote_uid:         String,
  pub remote_href:        String,
  pub etag:               Option<String>,
  pub status:             String,
  pub local_hash:         Option<String>,
  pub remote_hash:        Option<String>,
  pub last_local_change:  Option<String>,
  pub last_remote_change: Option<String>,
  pub last_synced_at:     Option<String>,
}

impl RawMapping {
  pub fn into_mapping(self) -> Result<Mapping> {
    Ok(Mapping {
      mapping_id: decode_uuid(&self.mapping_id)?,
      connection_id: decode_uuid(&self.connection_id)?,
      contact_id: decode_uuid(&self.contact_id)?,
      remote_uid: self.remote_uid,
      remote_href: self.remote_href,
      etag: self.etag,
      status: decode_status(&self.status)?,
      local_hash: self.local_hash,
      remote_hash: self.remote_hash,
      last_local_change: decode_opt_dt(self.last_local_change)?,
      last_remote_change: decode_opt_dt(self.last_remote_change)?,
      last_synced_at: decode_opt_dt(self.last_synced_at)?,
    })
  }
}

/// Raw strings read directly from a `connections` row.
pub struct RawConnection {
  pub connection_id:         String,
  pub owner_id:              String,
  pub server_url:            String,
  pub username:              String,
  pub password:              String,
  pub sync_enabled:          bool,
  pub auto_export_new:       bool,
  pub sync_interval_minutes: i64,
  pub import_mode:           String,
  pub last_error:            Option<String>,
  pub last_error_at:         Option<String>,
  pub last_synced_at:        Option<String>,
}

impl RawConnection {
  pub fn into_connection(self) -> Result<Connection> {
    Ok(Connection {
      connection_id: decode_uuid(&self.connection_id)?,
      owner_id: decode_uuid(&self.owner_id)?,
      server_url: self.server_url,
      username: self.username,
      password: self.password,
      sync_enabled: self.sync_enabled,
      auto_export_new: self.auto_export_new,
      sync_interval_minutes: self.sync_interval_minutes as u32,
      import_mode: decode_import_mode(&self.import_mode)?,
      last_error: self.last_error,
      last_error_at: decode_opt_dt(self.last_error_at)?,
      last_synced_at: decode_opt_dt(self.last_synced_at)?,
    })
  }
}

/// Raw strings read directly from a `pending_imports` row.
pub struct RawPendingImport {
  pub import_id:     String,
  pub connection_id: String,
  pub remote_uid:    String,
  pub remote_href:   String,
  pub etag:          Option<String>,
  pub payload:       String,
  pub display_name:  Option<String>,
  pub created_at:    String,
}

impl RawPendingImport {
  pub fn into_import(self) -> Result<PendingImport> {
    Ok(PendingImport {
      import_id: decode_uuid(&self.import_id)?,
      connection_id: decode_uuid(&self.connection_id)?,
      remote_uid: self.remote_uid,
      remote_href: self.remote_href,
      etag: self.etag,
      payload: self.payload,
      display_name: self.display_name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `conflicts` row.
pub struct RawConflict {
  pub conflict_id:     String,
  pub mapping_id:      String,
  pub connection_id:   String,
  pub contact_id:      String,
  pub local_snapshot:  String,
  pub remote_snapshot: String,
  pub remote_etag:     Option<String>,
  pub detected_at:     String,
}

impl RawConflict {
  pub fn into_conflict(self) -> Result<Conflict> {
    Ok(Conflict {
      conflict_id: decode_uuid(&self.conflict_id)?,
      mapping_id: decode_uuid(&self.mapping_id)?,
      connection_id: decode_uuid(&self.connection_id)?,
      contact_id: decode_uuid(&self.contact_id)?,
      local_snapshot: self.local_snapshot,
      remote_snapshot: self.remote_snapshot,
      remote_etag: self.remote_etag,
      detected_at: decode_dt(&self.detected_at)?,
    })
  }
}
