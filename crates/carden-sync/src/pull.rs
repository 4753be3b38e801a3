//! Pull phase: remote address book → local contacts.
//!
//! One bulk list-with-etags call bounds the phase to O(1) round trips plus
//! one fetch per item that actually needs inspection. Items correlate
//! through the pass's [`MappingIndex`]: first by vCard UID, then by resource
//! href — the href fallback catches servers that rewrite the UID of freshly
//! created resources.

use carden_core::{
  RemoteError,
  connection::{Connection, ImportMode},
  mapping::{Conflict, MappingStatus, PendingImport},
  store::{AddressBook, ContactRepository, MappingStore, RemoteResource},
  sync::{Progress, ProgressSink, SyncPhase, SyncResult},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  classify::{ItemState, classify},
  hash::{local_hash, sha256_hex},
  index::MappingIndex,
};

/// What processing one listed item amounted to.
enum Outcome {
  Skipped,
  Unchanged,
  /// `true` when a new pending import was queued (not a dedup no-op).
  Pending(bool),
  UpdatedLocally,
  Conflict,
  /// Local-only change; the push phase owns it.
  LocalOnly,
}

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
  let resources = remote.list(addressbook_href).await?;
  let total = resources.len();
  tracing::debug!(total, "pull: listed remote resources");

  let mut result = SyncResult::default();
  for (i, resource) in resources.iter().enumerate() {
    progress.progress(&Progress {
      phase:   SyncPhase::Pull,
      current: i + 1,
      total,
      label:   Some(resource.href.clone()),
    });

    match process_item(store, remote, connection, index, resource).await {
      Ok(Outcome::Skipped | Outcome::Unchanged | Outcome::LocalOnly) => {}
      Ok(Outcome::Pending(inserted)) => {
        if inserted {
          result.pending_imports += 1;
        }
      }
      Ok(Outcome::UpdatedLocally) => result.updated_locally += 1,
      Ok(Outcome::Conflict) => result.conflicts += 1,
      Err(err) if is_item_scoped(&err) => {
        tracing::warn!(href = %resource.href, %err, "pull: item failed");
        result.record_error(format!("{}: {err}", resource.href));
      }
      Err(err) => return Err(err),
    }
  }

  Ok(result)
}

fn is_item_scoped(err: &Error) -> bool {
  match err {
    Error::Remote(re) => re.is_item_scoped(),
    // unparseable payloads and dangling mappings spoil one item, not the pass
    Error::Vcard(_) | Error::ContactNotFound(_) => true,
    _ => false,
  }
}

async fn process_item<S, A>(
  store: &S,
  remote: &A,
  connection: &Connection,
  index: &mut MappingIndex,
  resource: &RemoteResource,
) -> Result<Outcome>
where
  S: ContactRepository + MappingStore,
  A: AddressBook,
{
  let href = resource.href.as_str();
  let listed_etag = resource.etag.as_str();
  let matched_by_href = index.by_href(href).cloned();

  // Same etag as last sync: decide from local state alone, zero fetches.
  if let Some(m) = &matched_by_href
    && m.etag.as_deref() == Some(listed_etag)
  {
    let local = ContactRepository::get(store, m.contact_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ContactNotFound(m.contact_id))?;
    let lh = local_hash(&local);
    return if lh.is_some() && lh == m.local_hash {
      Ok(Outcome::Unchanged)
    } else {
      Ok(Outcome::LocalOnly)
    };
  }

  let fetched = remote.fetch(href).await?;
  let etag = fetched.etag.clone().or_else(|| Some(listed_etag.to_owned()));
  let parsed = carden_vcard::parse(&fetched.body)?;
  let Some(uid) = parsed.contact.uid.clone() else {
    // Without a UID the item cannot be correlated on any later pass either.
    return Err(Error::Remote(RemoteError::Malformed(format!(
      "{href}: resource has no UID"
    ))));
  };

  let mapping = match index.by_uid(&uid).cloned() {
    Some(m) => Some(m),
    None => match matched_by_href {
      // UID miss, locator hit: the server rewrote the UID of a contact we
      // created. Both the mapping and the contact follow the server's value
      // so the next pass matches by UID directly.
      Some(m) => {
        tracing::info!(
          href,
          old_uid = %m.remote_uid,
          new_uid = %uid,
          "pull: server rewrote vcard uid"
        );
        store
          .rewrite_remote_uid(m.mapping_id, &uid)
          .await
          .map_err(Error::store)?;
        store
          .set_uid(m.contact_id, &uid)
          .await
          .map_err(Error::store)?;
        let mut m = m;
        m.remote_uid = uid.clone();
        index.update(m.clone());
        Some(m)
      }
      None => None,
    },
  };

  let Some(mut mapping) = mapping else {
    if connection.import_mode == ImportMode::Off {
      return Ok(Outcome::Skipped);
    }
    let import = PendingImport {
      import_id: Uuid::new_v4(),
      connection_id: connection.connection_id,
      remote_uid: uid,
      remote_href: href.to_owned(),
      etag,
      display_name: Some(parsed.contact.display_name()),
      payload: fetched.body,
      created_at: Utc::now(),
    };
    let inserted = store
      .add_pending_import(&import)
      .await
      .map_err(Error::store)?;
    return Ok(Outcome::Pending(inserted));
  };

  let remote_hash = sha256_hex(fetched.body.as_bytes());
  let remote_changed = mapping.remote_hash.as_deref() != Some(&remote_hash);

  let mut local = ContactRepository::get(store, mapping.contact_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::ContactNotFound(mapping.contact_id))?;
  let lh = local_hash(&local);
  let local_changed = lh.is_none() || lh != mapping.local_hash;

  let now = Utc::now();
  let state = classify(true, remote_changed, local_changed);
  match state {
    ItemState::Unmatched => unreachable!("mapping is present"),
    ItemState::MatchedUnchanged | ItemState::MatchedLocalChanged => {
      // Content did not move remotely, only the etag did (or the item was
      // found through a fresh lookup). Refresh the bookkeeping so the push
      // phase guards its update with the current etag.
      let local_only = state == ItemState::MatchedLocalChanged;
      mapping.etag = etag;
      mapping.remote_href = href.to_owned();
      mapping.remote_hash = Some(remote_hash);
      store.upsert(&mapping).await.map_err(Error::store)?;
      index.update(mapping);
      if local_only {
        Ok(Outcome::LocalOnly)
      } else {
        Ok(Outcome::Unchanged)
      }
    }
    ItemState::MatchedRemoteChanged => {
      local.overwrite_from(&parsed.contact, now);
      store.replace(&local).await.map_err(Error::store)?;

      mapping.etag = etag;
      mapping.remote_href = href.to_owned();
      mapping.remote_hash = Some(remote_hash);
      mapping.local_hash = local_hash(&local);
      mapping.status = MappingStatus::Synced;
      mapping.last_remote_change = Some(now);
      mapping.last_synced_at = Some(now);
      store.upsert(&mapping).await.map_err(Error::store)?;
      index.update(mapping);
      Ok(Outcome::UpdatedLocally)
    }
    ItemState::MatchedBothChanged => {
      if mapping.status == MappingStatus::Conflict {
        // Already snapshotted on an earlier pass; waiting on resolution.
        return Ok(Outcome::Skipped);
      }
      let conflict = Conflict {
        conflict_id: Uuid::new_v4(),
        mapping_id: mapping.mapping_id,
        connection_id: connection.connection_id,
        contact_id: mapping.contact_id,
        local_snapshot: carden_vcard::serialize(&local)?,
        remote_snapshot: fetched.body,
        remote_etag: etag,
        detected_at: now,
      };
      store.add_conflict(&conflict).await.map_err(Error::store)?;

      mapping.status = MappingStatus::Conflict;
      store.upsert(&mapping).await.map_err(Error::store)?;
      index.update(mapping);
      Ok(Outcome::Conflict)
    }
  }
}
