//! Storage and protocol traits consumed by the sync engine.
//!
//! The traits are implemented by concrete backends (`carden-store-sqlite`,
//! `carden-dav`); the engine depends only on these abstractions, which is
//! also what makes it testable against scripted fakes.
//!
//! All methods return `Send` futures so the traits can be used on
//! multi-threaded async runtimes.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  RemoteError,
  connection::Connection,
  contact::Contact,
  mapping::{Conflict, Mapping, PendingImport},
};

// ─── Contact repository ──────────────────────────────────────────────────────

/// CRUD over local contacts, scoped by owner.
pub trait ContactRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn create<'a>(
    &'a self,
    contact: &'a Contact,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  fn list(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Overwrite the stored record with `contact` — scalars and all
  /// sub-collections replaced in one atomic write. The stored `updated_at`
  /// is taken from `contact` as given.
  fn replace<'a>(
    &'a self,
    contact: &'a Contact,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Persist a newly assigned vCard UID without touching `updated_at`, so
  /// UID assignment during export is never mistaken for a local edit.
  fn set_uid<'a>(
    &'a self,
    contact_id: Uuid,
    uid: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Contacts of the connection's owner that are eligible for sync and have
  /// no mapping for that connection yet — the push phase's work list.
  fn sync_eligible_unmapped(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;
}

// ─── Mapping store ───────────────────────────────────────────────────────────

/// Persistence for mappings, pending imports, and conflict snapshots.
pub trait MappingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Bulk read of every mapping for one connection — executed exactly once
  /// per pass to feed the in-memory correlation index.
  fn load_for_connection(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Mapping>, Self::Error>> + Send + '_;

  fn get(
    &self,
    mapping_id: Uuid,
  ) -> impl Future<Output = Result<Option<Mapping>, Self::Error>> + Send + '_;

  /// Insert or fully update a mapping, keyed by `mapping_id`. The
  /// `(connection, contact)` and `(connection, remote_uid)` uniqueness
  /// invariants are enforced here.
  fn upsert<'a>(
    &'a self,
    mapping: &'a Mapping,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Rewrite the stored remote UID after a server-side UID rewrite was
  /// detected via the locator.
  fn rewrite_remote_uid<'a>(
    &'a self,
    mapping_id: Uuid,
    new_uid: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_for_contact(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_for_connection(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Pending imports ───────────────────────────────────────────────────

  /// Queue a pending import. Returns `false` (and writes nothing) when one
  /// already exists for `(connection, remote_uid)`.
  fn add_pending_import<'a>(
    &'a self,
    import: &'a PendingImport,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn list_pending_imports(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PendingImport>, Self::Error>> + Send + '_;

  fn get_pending_import(
    &self,
    import_id: Uuid,
  ) -> impl Future<Output = Result<Option<PendingImport>, Self::Error>> + Send + '_;

  fn delete_pending_import(
    &self,
    import_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Conflicts ─────────────────────────────────────────────────────────

  fn add_conflict<'a>(
    &'a self,
    conflict: &'a Conflict,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_conflicts(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Conflict>, Self::Error>> + Send + '_;

  fn get_conflict(
    &self,
    conflict_id: Uuid,
  ) -> impl Future<Output = Result<Option<Conflict>, Self::Error>> + Send + '_;

  fn delete_conflict(
    &self,
    conflict_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Connection store ────────────────────────────────────────────────────────

/// Read connection configuration; write health markers.
pub trait ConnectionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<Option<Connection>, Self::Error>> + Send + '_;

  fn list(
    &self,
  ) -> impl Future<Output = Result<Vec<Connection>, Self::Error>> + Send + '_;

  fn upsert<'a>(
    &'a self,
    connection: &'a Connection,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Record a pass-level failure: last-error message and timestamp.
  fn record_error<'a>(
    &'a self,
    connection_id: Uuid,
    message: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Record a successful pass and clear any previous error.
  fn record_success(
    &self,
    connection_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Protocol client ─────────────────────────────────────────────────────────

/// One resource listed from the remote address book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
  pub href: String,
  pub etag: String,
}

/// A fetched resource body with its etag.
#[derive(Debug, Clone)]
pub struct FetchedResource {
  pub body: String,
  pub etag: Option<String>,
}

/// The thin CardDAV surface the engine consumes.
///
/// All errors are pre-classified into the [`RemoteError`] taxonomy; the
/// concrete client performs its own bounded retry for transient failures
/// before returning.
pub trait AddressBook: Send + Sync {
  /// Resolve the connection's single address-book collection href.
  fn discover(
    &self,
  ) -> impl Future<Output = Result<String, RemoteError>> + Send + '_;

  /// Bulk-list all resources with their etags in one round trip.
  fn list<'a>(
    &'a self,
    addressbook_href: &'a str,
  ) -> impl Future<Output = Result<Vec<RemoteResource>, RemoteError>> + Send + 'a;

  fn fetch<'a>(
    &'a self,
    href: &'a str,
  ) -> impl Future<Output = Result<FetchedResource, RemoteError>> + Send + 'a;

  /// Create a new resource; fails if one already exists at `href`.
  /// Returns the etag when the server provides one.
  fn create<'a>(
    &'a self,
    href: &'a str,
    body: &'a str,
  ) -> impl Future<Output = Result<Option<String>, RemoteError>> + Send + 'a;

  /// Update an existing resource guarded by `etag`; a server-side mismatch
  /// yields [`RemoteError::EtagMismatch`].
  fn update<'a>(
    &'a self,
    href: &'a str,
    body: &'a str,
    etag: &'a str,
  ) -> impl Future<Output = Result<Option<String>, RemoteError>> + Send + 'a;
}
