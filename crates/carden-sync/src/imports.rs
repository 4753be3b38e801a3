//! Pending-import review actions.
//!
//! Unmatched remote contacts wait in the pending-import queue until the user
//! accepts or discards them; nothing is merged automatically.

use carden_core::{
  contact::Contact,
  mapping::Mapping,
  store::{ConnectionStore, ContactRepository, MappingStore},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  hash::{local_hash, sha256_hex},
};

/// Accept a pending import: parse its payload into a new local contact and
/// correlate it with the remote resource it came from.
///
/// Idempotent against a mapping that already exists for the same remote UID
/// (e.g. the import was accepted and the queue entry survived a crash): the
/// stale queue entry is dropped without creating a duplicate contact.
pub(crate) async fn accept<S>(store: &S, import_id: Uuid) -> Result<Uuid>
where
  S: ContactRepository + MappingStore + ConnectionStore,
{
  let import = store
    .get_pending_import(import_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ImportNotFound(import_id))?;
  let connection = ConnectionStore::get(store, import.connection_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ConnectionNotFound(import.connection_id))?;

  let existing = store
    .load_for_connection(import.connection_id)
    .await
    .map_err(Error::store)?;
  if let Some(m) = existing.iter().find(|m| m.remote_uid == import.remote_uid)
  {
    store
      .delete_pending_import(import.import_id)
      .await
      .map_err(Error::store)?;
    return Ok(m.contact_id);
  }

  let parsed = carden_vcard::parse(&import.payload)?;
  let now = Utc::now();
  let mut contact = Contact::new(connection.owner_id, now);
  contact.overwrite_from(&parsed.contact, now);
  store.create(&contact).await.map_err(Error::store)?;

  let mut mapping = Mapping::synced(
    import.connection_id,
    contact.contact_id,
    import.remote_uid.clone(),
    import.remote_href.clone(),
    import.etag.clone(),
    now,
  );
  mapping.remote_hash = Some(sha256_hex(import.payload.as_bytes()));
  mapping.local_hash = local_hash(&contact);
  mapping.last_remote_change = Some(now);
  MappingStore::upsert(store, &mapping)
    .await
    .map_err(Error::store)?;

  store
    .delete_pending_import(import.import_id)
    .await
    .map_err(Error::store)?;

  tracing::info!(
    import_id = %import.import_id,
    contact_id = %contact.contact_id,
    "pending import accepted"
  );
  Ok(contact.contact_id)
}

/// Discard a pending import without touching local contacts. The same remote
/// contact will be queued again on the next pull while it stays unmatched.
pub(crate) async fn discard<S>(store: &S, import_id: Uuid) -> Result<()>
where
  S: MappingStore,
{
  let import = store
    .get_pending_import(import_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ImportNotFound(import_id))?;
  store
    .delete_pending_import(import.import_id)
    .await
    .map_err(Error::store)?;
  Ok(())
}
