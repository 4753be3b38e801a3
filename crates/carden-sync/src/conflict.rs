//! Whole-record conflict resolution.
//!
//! A conflict holds both serialized representations from detection time; the
//! only resolutions are keep-local and keep-remote. Keep-local re-exports the
//! local record guarded by the snapshot's etag — if the server moved again in
//! the meantime the precondition fails and the conflict stays open.

use carden_core::{
  mapping::{MappingStatus, Resolution},
  store::{AddressBook, ContactRepository, MappingStore},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  hash::{local_hash, sha256_hex},
};

pub(crate) async fn resolve<S, A>(
  store: &S,
  remote: &A,
  conflict_id: Uuid,
  resolution: Resolution,
) -> Result<()>
where
  S: ContactRepository + MappingStore,
  A: AddressBook,
{
  let conflict = store
    .get_conflict(conflict_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ConflictNotFound(conflict_id))?;
  let mut mapping = MappingStore::get(store, conflict.mapping_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::MappingNotFound(conflict.mapping_id))?;
  let mut local = ContactRepository::get(store, conflict.contact_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ContactNotFound(conflict.contact_id))?;

  let now = Utc::now();
  match resolution {
    Resolution::KeepRemote => {
      let parsed = carden_vcard::parse(&conflict.remote_snapshot)?;
      local.overwrite_from(&parsed.contact, now);
      store.replace(&local).await.map_err(Error::store)?;

      mapping.etag = conflict.remote_etag.clone();
      mapping.remote_hash =
        Some(sha256_hex(conflict.remote_snapshot.as_bytes()));
      mapping.local_hash = local_hash(&local);
      mapping.last_remote_change = Some(now);
    }
    Resolution::KeepLocal => {
      let body = carden_vcard::serialize(&local)?;
      let guard = conflict
        .remote_etag
        .as_deref()
        .or(mapping.etag.as_deref())
        .unwrap_or("*");
      // An etag mismatch here propagates and leaves the conflict open for
      // another resolution attempt; nothing is force-overwritten.
      let new_etag = remote.update(&mapping.remote_href, &body, guard).await?;

      let body_hash = sha256_hex(body.as_bytes());
      mapping.etag = new_etag;
      mapping.local_hash = Some(body_hash.clone());
      mapping.remote_hash = Some(body_hash);
      mapping.last_local_change = Some(now);
    }
  }

  mapping.status = MappingStatus::Synced;
  mapping.last_synced_at = Some(now);
  store.upsert(&mapping).await.map_err(Error::store)?;
  store
    .delete_conflict(conflict.conflict_id)
    .await
    .map_err(Error::store)?;

  tracing::info!(
    conflict_id = %conflict.conflict_id,
    contact_id = %conflict.contact_id,
    ?resolution,
    "conflict resolved"
  );
  Ok(())
}
