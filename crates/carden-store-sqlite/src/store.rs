//! [`SqliteStore`] — the SQLite implementation of the carden storage traits.

use std::path::Path;

use carden_core::{
  connection::Connection,
  contact::Contact,
  mapping::{Conflict, Mapping, PendingImport},
  store::{ConnectionStore, ContactRepository, MappingStore},
};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Row};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawConflict, RawConnection, RawContact, RawMapping, RawPendingImport,
    encode_dt, encode_import_mode, encode_opt_dt, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row mappers ─────────────────────────────────────────────────────────────

const CONTACT_COLS: &str =
  "contact_id, owner_id, uid, created_at, updated_at, payload_json";

fn contact_row(row: &Row<'_>) -> rusqlite::Result<RawContact> {
  Ok(RawContact {
    contact_id:   row.get(0)?,
    owner_id:     row.get(1)?,
    uid:          row.get(2)?,
    created_at:   row.get(3)?,
    updated_at:   row.get(4)?,
    payload_json: row.get(5)?,
  })
}

const MAPPING_COLS: &str = "mapping_id, connection_id, contact_id, remote_uid, \
   remote_href, etag, status, local_hash, remote_hash, last_local_change, \
   last_remote_change, last_synced_at";

fn mapping_row(row: &Row<'_>) -> rusqlite::Result<RawMapping> {
  Ok(RawMapping {
    mapping_id:         row.get(0)?,
    connection_id:      row.get(1)?,
    contact_id:         row.get(2)?,
    remote_uid:         row.get(3)?,
    remote_href:        row.get(4)?,
    etag:               row.get(5)?,
    status:             row.get(6)?,
    local_hash:         row.get(7)?,
    remote_hash:        row.get(8)?,
    last_local_change:  row.get(9)?,
    last_remote_change: row.get(10)?,
    last_synced_at:     row.get(11)?,
  })
}

const CONNECTION_COLS: &str = "connection_id, owner_id, server_url, username, \
   password, sync_enabled, auto_export_new, sync_interval_minutes, \
   import_mode, last_error, last_error_at, last_synced_at";

fn connection_row(row: &Row<'_>) -> rusqlite::Result<RawConnection> {
  Ok(RawConnection {
    connection_id:         row.get(0)?,
    owner_id:              row.get(1)?,
    server_url:            row.get(2)?,
    username:              row.get(3)?,
    password:              row.get(4)?,
    sync_enabled:          row.get(5)?,
    auto_export_new:       row.get(6)?,
    sync_interval_minutes: row.get(7)?,
    import_mode:           row.get(8)?,
    last_error:            row.get(9)?,
    last_error_at:         row.get(10)?,
    last_synced_at:        row.get(11)?,
  })
}

const IMPORT_COLS: &str = "import_id, connection_id, remote_uid, remote_href, \
   etag, payload, display_name, created_at";

fn import_row(row: &Row<'_>) -> rusqlite::Result<RawPendingImport> {
  Ok(RawPendingImport {
    import_id:     row.get(0)?,
    connection_id: row.get(1)?,
    remote_uid:    row.get(2)?,
    remote_href:   row.get(3)?,
    etag:          row.get(4)?,
    payload:       row.get(5)?,
    display_name:  row.get(6)?,
    created_at:    row.get(7)?,
  })
}

const CONFLICT_COLS: &str = "conflict_id, mapping_id, connection_id, \
   contact_id, local_snapshot, remote_snapshot, remote_etag, detected_at";

fn conflict_row(row: &Row<'_>) -> rusqlite::Result<RawConflict> {
  Ok(RawConflict {
    conflict_id:     row.get(0)?,
    mapping_id:      row.get(1)?,
    connection_id:   row.get(2)?,
    contact_id:      row.get(3)?,
    local_snapshot:  row.get(4)?,
    remote_snapshot: row.get(5)?,
    remote_etag:     row.get(6)?,
    detected_at:     row.get(7)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A carden store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn contact_params(contact: &Contact) -> Result<ContactParams> {
    Ok(ContactParams {
      contact_id:   encode_uuid(contact.contact_id),
      owner_id:     encode_uuid(contact.owner_id),
      uid:          contact.uid.clone(),
      created_at:   encode_dt(contact.created_at),
      updated_at:   encode_dt(contact.updated_at),
      payload_json: serde_json::to_string(contact)?,
    })
  }
}

struct ContactParams {
  contact_id:   String,
  owner_id:     String,
  uid:          Option<String>,
  created_at:   String,
  updated_at:   String,
  payload_json: String,
}

// ─── ContactRepository impl ──────────────────────────────────────────────────

impl ContactRepository for SqliteStore {
  type Error = Error;

  async fn create(&self, contact: &Contact) -> Result<()> {
    let p = Self::contact_params(contact)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contacts (contact_id, owner_id, uid, created_at, updated_at, payload_json)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            p.contact_id,
            p.owner_id,
            p.uid,
            p.created_at,
            p.updated_at,
            p.payload_json,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get(&self, contact_id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(contact_id);
    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONTACT_COLS} FROM contacts WHERE contact_id = ?1"),
              rusqlite::params![id_str],
              contact_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawContact::into_contact).transpose()
  }

  async fn list(&self, owner_id: Uuid) -> Result<Vec<Contact>> {
    let owner_str = encode_uuid(owner_id);
    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLS} FROM contacts WHERE owner_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], contact_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawContact::into_contact).collect()
  }

  async fn replace(&self, contact: &Contact) -> Result<()> {
    let p = Self::contact_params(contact)?;
    let contact_id = contact.contact_id;
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts
           SET uid = ?2, updated_at = ?3, payload_json = ?4
           WHERE contact_id = ?1",
          rusqlite::params![p.contact_id, p.uid, p.updated_at, p.payload_json],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(Error::ContactNotFound(contact_id));
    }
    Ok(())
  }

  async fn set_uid(&self, contact_id: Uuid, uid: &str) -> Result<()> {
    // Only the uid column moves; updated_at stays so the assignment is not
    // mistaken for a local edit.
    let id_str = encode_uuid(contact_id);
    let uid = uid.to_owned();
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts SET uid = ?2 WHERE contact_id = ?1",
          rusqlite::params![id_str, uid],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(Error::ContactNotFound(contact_id));
    }
    Ok(())
  }

  async fn delete(&self, contact_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(contact_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM contacts WHERE contact_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn sync_eligible_unmapped(
    &self,
    connection_id: Uuid,
  ) -> Result<Vec<Contact>> {
    let conn_str = encode_uuid(connection_id);
    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLS} FROM contacts c
           WHERE c.owner_id =
                 (SELECT owner_id FROM connections WHERE connection_id = ?1)
             AND NOT EXISTS (
                 SELECT 1 FROM mappings m
                 WHERE m.connection_id = ?1 AND m.contact_id = c.contact_id)
           ORDER BY c.created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![conn_str], contact_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawContact::into_contact).collect()
  }
}

// ─── MappingStore impl ───────────────────────────────────────────────────────

impl MappingStore for SqliteStore {
  type Error = Error;

  async fn load_for_connection(
    &self,
    connection_id: Uuid,
  ) -> Result<Vec<Mapping>> {
    let conn_str = encode_uuid(connection_id);
    let raws: Vec<RawMapping> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MAPPING_COLS} FROM mappings WHERE connection_id = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![conn_str], mapping_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawMapping::into_mapping).collect()
  }

  async fn get(&self, mapping_id: Uuid) -> Result<Option<Mapping>> {
    let id_str = encode_uuid(mapping_id);
    let raw: Option<RawMapping> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MAPPING_COLS} FROM mappings WHERE mapping_id = ?1"),
              rusqlite::params![id_str],
              mapping_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawMapping::into_mapping).transpose()
  }

  async fn upsert(&self, mapping: &Mapping) -> Result<()> {
    let m = mapping.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO mappings (
             mapping_id, connection_id, contact_id, remote_uid, remote_href,
             etag, status, local_hash, remote_hash,
             last_local_change, last_remote_change, last_synced_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT (mapping_id) DO UPDATE SET
             remote_uid = ?4, remote_href = ?5, etag = ?6, status = ?7,
             local_hash = ?8, remote_hash = ?9, last_local_change = ?10,
             last_remote_change = ?11, last_synced_at = ?12",
          rusqlite::params![
            encode_uuid(m.mapping_id),
            encode_uuid(m.connection_id),
            encode_uuid(m.contact_id),
            m.remote_uid,
            m.remote_href,
            m.etag,
            encode_status(m.status),
            m.local_hash,
            m.remote_hash,
            encode_opt_dt(m.last_local_change),
            encode_opt_dt(m.last_remote_change),
            encode_opt_dt(m.last_synced_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn rewrite_remote_uid(
    &self,
    mapping_id: Uuid,
    new_uid: &str,
  ) -> Result<()> {
    let id_str = encode_uuid(mapping_id);
    let new_uid = new_uid.to_owned();
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE mappings SET remote_uid = ?2 WHERE mapping_id = ?1",
          rusqlite::params![id_str, new_uid],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(Error::MappingNotFound(mapping_id));
    }
    Ok(())
  }

  async fn delete_for_contact(&self, contact_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(contact_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM mappings WHERE contact_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_for_connection(&self, connection_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(connection_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM mappings WHERE connection_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Pending imports ────────────────────────────────────────────────────

  async fn add_pending_import(&self, import: &PendingImport) -> Result<bool> {
    let i = import.clone();
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO pending_imports (
             import_id, connection_id, remote_uid, remote_href,
             etag, payload, display_name, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(i.import_id),
            encode_uuid(i.connection_id),
            i.remote_uid,
            i.remote_href,
            i.etag,
            i.payload,
            i.display_name,
            encode_dt(i.created_at),
          ],
        )?)
      })
      .await?;
    Ok(inserted > 0)
  }

  async fn list_pending_imports(
    &self,
    connection_id: Uuid,
  ) -> Result<Vec<PendingImport>> {
    let conn_str = encode_uuid(connection_id);
    let raws: Vec<RawPendingImport> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IMPORT_COLS} FROM pending_imports
           WHERE connection_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![conn_str], import_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPendingImport::into_import).collect()
  }

  async fn get_pending_import(
    &self,
    import_id: Uuid,
  ) -> Result<Option<PendingImport>> {
    let id_str = encode_uuid(import_id);
    let raw: Option<RawPendingImport> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {IMPORT_COLS} FROM pending_imports WHERE import_id = ?1"),
              rusqlite::params![id_str],
              import_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPendingImport::into_import).transpose()
  }

  async fn delete_pending_import(&self, import_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(import_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM pending_imports WHERE import_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Conflicts ──────────────────────────────────────────────────────────

  async fn add_conflict(&self, conflict: &Conflict) -> Result<()> {
    let c = conflict.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO conflicts (
             conflict_id, mapping_id, connection_id, contact_id,
             local_snapshot, remote_snapshot, remote_etag, detected_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(c.conflict_id),
            encode_uuid(c.mapping_id),
            encode_uuid(c.connection_id),
            encode_uuid(c.contact_id),
            c.local_snapshot,
            c.remote_snapshot,
            c.remote_etag,
            encode_dt(c.detected_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_conflicts(&self, connection_id: Uuid) -> Result<Vec<Conflict>> {
    let conn_str = encode_uuid(connection_id);
    let raws: Vec<RawConflict> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONFLICT_COLS} FROM conflicts
           WHERE connection_id = ?1 ORDER BY detected_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![conn_str], conflict_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawConflict::into_conflict).collect()
  }

  async fn get_conflict(&self, conflict_id: Uuid) -> Result<Option<Conflict>> {
    let id_str = encode_uuid(conflict_id);
    let raw: Option<RawConflict> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONFLICT_COLS} FROM conflicts WHERE conflict_id = ?1"),
              rusqlite::params![id_str],
              conflict_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawConflict::into_conflict).transpose()
  }

  async fn delete_conflict(&self, conflict_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(conflict_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM conflicts WHERE conflict_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ConnectionStore impl ────────────────────────────────────────────────────

impl ConnectionStore for SqliteStore {
  type Error = Error;

  async fn get(&self, connection_id: Uuid) -> Result<Option<Connection>> {
    let id_str = encode_uuid(connection_id);
    let raw: Option<RawConnection> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONNECTION_COLS} FROM connections WHERE connection_id = ?1"),
              rusqlite::params![id_str],
              connection_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawConnection::into_connection).transpose()
  }

  async fn list(&self) -> Result<Vec<Connection>> {
    let raws: Vec<RawConnection> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONNECTION_COLS} FROM connections ORDER BY server_url"
        ))?;
        let rows = stmt
          .query_map([], connection_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws
      .into_iter()
      .map(RawConnection::into_connection)
      .collect()
  }

  async fn upsert(&self, connection: &Connection) -> Result<()> {
    let c = connection.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO connections (
             connection_id, owner_id, server_url, username, password,
             sync_enabled, auto_export_new, sync_interval_minutes,
             import_mode, last_error, last_error_at, last_synced_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT (connection_id) DO UPDATE SET
             server_url = ?3, username = ?4, password = ?5,
             sync_enabled = ?6, auto_export_new = ?7,
             sync_interval_minutes = ?8, import_mode = ?9,
             last_error = ?10, last_error_at = ?11, last_synced_at = ?12",
          rusqlite::params![
            encode_uuid(c.connection_id),
            encode_uuid(c.owner_id),
            c.server_url,
            c.username,
            c.password,
            c.sync_enabled,
            c.auto_export_new,
            c.sync_interval_minutes as i64,
            encode_import_mode(c.import_mode),
            c.last_error,
            encode_opt_dt(c.last_error_at),
            encode_opt_dt(c.last_synced_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_error(
    &self,
    connection_id: Uuid,
    message: &str,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(connection_id);
    let message = message.to_owned();
    let at_str = encode_dt(at);
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE connections SET last_error = ?2, last_error_at = ?3
           WHERE connection_id = ?1",
          rusqlite::params![id_str, message, at_str],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(Error::ConnectionNotFound(connection_id));
    }
    Ok(())
  }

  async fn record_success(
    &self,
    connection_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(connection_id);
    let at_str = encode_dt(at);
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE connections
           SET last_error = NULL, last_error_at = NULL, last_synced_at = ?2
           WHERE connection_id = ?1",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(Error::ConnectionNotFound(connection_id));
    }
    Ok(())
  }
}
