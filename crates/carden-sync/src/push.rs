//! Push phase: local contacts → remote address book.
//!
//! Two work lists, both derived from state already in memory: mapped
//! contacts whose content hash moved (update-by-etag), and sync-eligible
//! contacts with no mapping yet (create). Creates are gated by the
//! connection's auto-export toggle; updates always run.

use carden_core::{
  connection::Connection,
  contact::Contact,
  mapping::{Mapping, MappingStatus},
  store::{AddressBook, ContactRepository, MappingStore},
  sync::{Progress, ProgressSink, SyncPhase, SyncResult},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  hash::sha256_hex,
  index::MappingIndex,
};

pub(crate) async fn run<S, A, P>(
  store: &S,
  remote: &A,
  progress: &P,
  connection: &Connection,
  addressbook_href: &str,
  index: &mut MappingIndex,
) -> Result<SyncResult>
where
  S: ContactRepository + MappingStore,
  A: AddressBook,
  P: ProgressSink,
{
  let mut result = SyncResult::default();

  // ── Updates: mapped contacts whose exported form moved ─────────────────
  let candidates: Vec<Mapping> = index
    .iter()
    .filter(|m| m.status != MappingStatus::Conflict)
    .cloned()
    .collect();

  let exports: Vec<Contact> = if connection.auto_export_new {
    store
      .sync_eligible_unmapped(connection.connection_id)
      .await
      .map_err(Error::store)?
  } else {
    Vec::new()
  };

  let total = candidates.len() + exports.len();
  let mut current = 0;

  for mapping in candidates {
    current += 1;
    progress.progress(&Progress {
      phase:   SyncPhase::Push,
      current,
      total,
      label:   Some(mapping.remote_href.clone()),
    });

    match push_update(store, remote, index, &mapping).await {
      Ok(true) => result.updated_remotely += 1,
      Ok(false) => {}
      Err(err) if is_item_scoped(&err) => {
        tracing::warn!(href = %mapping.remote_href, %err, "push: update failed");
        result.record_error(format!("{}: {err}", mapping.remote_href));
      }
      Err(err) => return Err(err),
    }
  }

  // ── Creates: eligible contacts with no mapping for this connection ─────
  for contact in exports {
    current += 1;
    progress.progress(&Progress {
      phase:   SyncPhase::Push,
      current,
      total,
      label:   Some(contact.display_name()),
    });

    match push_create(store, remote, connection, addressbook_href, index, contact)
      .await
    {
      Ok(()) => result.exported += 1,
      Err(err) if is_item_scoped(&err) => {
        tracing::warn!(%err, "push: create failed");
        result.record_error(err.to_string());
      }
      Err(err) => return Err(err),
    }
  }

  Ok(result)
}

fn is_item_scoped(err: &Error) -> bool {
  match err {
    Error::Remote(re) => re.is_item_scoped(),
    Error::Vcard(_) | Error::ContactNotFound(_) => true,
    _ => false,
  }
}

/// Push one mapped contact when its content moved. Returns `false` when
/// nothing needed pushing.
async fn push_update<S, A>(
  store: &S,
  remote: &A,
  index: &mut MappingIndex,
  mapping: &Mapping,
) -> Result<bool>
where
  S: ContactRepository + MappingStore,
  A: AddressBook,
{
  let contact = ContactRepository::get(store, mapping.contact_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ContactNotFound(mapping.contact_id))?;

  let body = carden_vcard::serialize(&contact)?;
  let body_hash = sha256_hex(body.as_bytes());
  if mapping.local_hash.as_deref() == Some(&body_hash) {
    return Ok(false);
  }

  // No stored etag means we never saw one from this server; `*` still
  // requires the resource to exist, so a concurrent delete surfaces as an
  // error instead of a blind re-create.
  let guard = mapping.etag.as_deref().unwrap_or("*");
  let new_etag = remote.update(&mapping.remote_href, &body, guard).await?;

  let now = Utc::now();
  let mut mapping = mapping.clone();
  mapping.etag = new_etag;
  mapping.local_hash = Some(body_hash.clone());
  mapping.remote_hash = Some(body_hash);
  mapping.status = MappingStatus::Synced;
  mapping.last_local_change = Some(now);
  mapping.last_synced_at = Some(now);
  store.upsert(&mapping).await.map_err(Error::store)?;
  index.update(mapping);
  Ok(true)
}

/// Export one local contact that has no mapping yet.
async fn push_create<S, A>(
  store: &S,
  remote: &A,
  connection: &Connection,
  addressbook_href: &str,
  index: &mut MappingIndex,
  mut contact: Contact,
) -> Result<()>
where
  S: ContactRepository + MappingStore,
  A: AddressBook,
{
  // The UID is assigned and persisted before serialization so the exported
  // vCard and the stored contact agree even if the create itself fails.
  let uid = match contact.uid.clone() {
    Some(uid) => uid,
    None => {
      let uid = Uuid::new_v4().hyphenated().to_string();
      store
        .set_uid(contact.contact_id, &uid)
        .await
        .map_err(Error::store)?;
      contact.uid = Some(uid.clone());
      uid
    }
  };

  let href = format!("{}/{uid}.vcf", addressbook_href.trim_end_matches('/'));
  let body = carden_vcard::serialize(&contact)?;
  let etag = remote.create(&href, &body).await?;

  let now = Utc::now();
  let body_hash = sha256_hex(body.as_bytes());
  let mut mapping = Mapping::synced(
    connection.connection_id,
    contact.contact_id,
    uid,
    href,
    etag,
    now,
  );
  mapping.local_hash = Some(body_hash.clone());
  mapping.remote_hash = Some(body_hash);
  store.upsert(&mapping).await.map_err(Error::store)?;
  index.update(mapping);
  Ok(())
}
