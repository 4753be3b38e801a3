//! [`SyncEngine`] — orchestrates sync passes for one connection.
//!
//! A pass is a single logical unit: discover, pull, push, in that order,
//! never interleaved per item. The engine assumes the surrounding scheduler
//! prevents overlapping passes for the same connection; the per-pass mapping
//! index is not shared. Cancelling the future is safe — partial writes are
//! idempotent under the correlation rules, so a resumed pass converges.

use carden_core::{
  connection::Connection,
  mapping::Resolution,
  store::{AddressBook, ConnectionStore, ContactRepository, MappingStore},
  sync::{NullProgress, Progress, ProgressSink, SyncPhase, SyncResult},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result, conflict, imports, index::MappingIndex, pull, push,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Pull,
  Push,
  Both,
}

pub struct SyncEngine<S, A, P = NullProgress> {
  store:    S,
  remote:   A,
  progress: P,
}

impl<S, A> SyncEngine<S, A>
where
  S: ContactRepository + MappingStore + ConnectionStore,
  A: AddressBook,
{
  pub fn new(store: S, remote: A) -> Self {
    Self {
      store,
      remote,
      progress: NullProgress,
    }
  }
}

impl<S, A, P> SyncEngine<S, A, P>
where
  S: ContactRepository + MappingStore + ConnectionStore,
  A: AddressBook,
  P: ProgressSink,
{
  pub fn with_progress(store: S, remote: A, progress: P) -> Self {
    Self {
      store,
      remote,
      progress,
    }
  }

  /// Bidirectional pass: pull fully, then push fully, merged counters.
  pub async fn sync(&self, connection_id: Uuid) -> Result<SyncResult> {
    self.run(connection_id, Mode::Both).await
  }

  pub async fn pull(&self, connection_id: Uuid) -> Result<SyncResult> {
    self.run(connection_id, Mode::Pull).await
  }

  pub async fn push(&self, connection_id: Uuid) -> Result<SyncResult> {
    self.run(connection_id, Mode::Push).await
  }

  /// Apply a keep-local or keep-remote resolution to a recorded conflict.
  pub async fn resolve_conflict(
    &self,
    conflict_id: Uuid,
    resolution: Resolution,
  ) -> Result<()> {
    conflict::resolve(&self.store, &self.remote, conflict_id, resolution).await
  }

  /// Accept a pending import, returning the new (or already correlated)
  /// local contact id.
  pub async fn accept_import(&self, import_id: Uuid) -> Result<Uuid> {
    imports::accept(&self.store, import_id).await
  }

  pub async fn discard_import(&self, import_id: Uuid) -> Result<()> {
    imports::discard(&self.store, import_id).await
  }

  async fn run(&self, connection_id: Uuid, mode: Mode) -> Result<SyncResult> {
    let connection = ConnectionStore::get(&self.store, connection_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ConnectionNotFound(connection_id))?;
    if !connection.sync_enabled {
      return Err(Error::ConnectionDisabled(connection_id));
    }

    match self.run_phases(&connection, mode).await {
      Ok(result) => {
        self
          .store
          .record_success(connection_id, Utc::now())
          .await
          .map_err(Error::store)?;
        tracing::info!(
          %connection_id,
          pending = result.pending_imports,
          exported = result.exported,
          updated_locally = result.updated_locally,
          updated_remotely = result.updated_remotely,
          conflicts = result.conflicts,
          errors = result.errors,
          "sync pass finished"
        );
        Ok(result)
      }
      Err(err) => {
        // The original error is what callers need; a failing health-marker
        // write only gets logged.
        if let Err(mark_err) = self
          .store
          .record_error(connection_id, &err.to_string(), Utc::now())
          .await
        {
          tracing::warn!(%connection_id, %mark_err, "failed to record sync error");
        }
        tracing::error!(%connection_id, %err, "sync pass failed");
        Err(err)
      }
    }
  }

  async fn run_phases(
    &self,
    connection: &Connection,
    mode: Mode,
  ) -> Result<SyncResult> {
    self.progress.progress(&Progress {
      phase:   SyncPhase::Discover,
      current: 0,
      total:   0,
      label:   None,
    });
    let addressbook_href = self.remote.discover().await?;
    tracing::debug!(href = %addressbook_href, "discovered address book");

    // The one bulk mapping read of the pass; pull and push share the index.
    let mappings = self
      .store
      .load_for_connection(connection.connection_id)
      .await
      .map_err(Error::store)?;
    let mut index = MappingIndex::new(mappings);

    let mut result = SyncResult::default();
    if matches!(mode, Mode::Pull | Mode::Both) {
      result.merge(
        pull::run(
          &self.store,
          &self.remote,
          &self.progress,
          connection,
          &addressbook_href,
          &mut index,
        )
        .await?,
      );
    }
    if matches!(mode, Mode::Push | Mode::Both) {
      result.merge(
        push::run(
          &self.store,
          &self.remote,
          &self.progress,
          connection,
          &addressbook_href,
          &mut index,
        )
        .await?,
      );
    }
    Ok(result)
  }
}
