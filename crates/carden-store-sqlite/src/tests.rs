//! Integration tests for `SqliteStore` against an in-memory database.

use carden_core::{
  connection::Connection,
  contact::{Contact, TypedEntry},
  mapping::{Conflict, Mapping, MappingStatus, PendingImport},
  store::{ConnectionStore, ContactRepository, MappingStore},
};
use chrono::Utc;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn sample_contact(owner_id: Uuid) -> Contact {
  let mut c = Contact::new(owner_id, Utc::now());
  c.name.given = Some("Alice".into());
  c.name.family = Some("Liddell".into());
  c.emails
    .push(TypedEntry::with_label("alice@example.com", "home"));
  c
}

async fn seed_connection(s: &SqliteStore, owner_id: Uuid) -> Connection {
  let conn = Connection::new(owner_id, "https://dav.example.com");
  ConnectionStore::upsert(s, &conn).await.unwrap();
  conn
}

// ─── Contacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_contact_round_trips_collections() {
  let s = store().await;
  let contact = sample_contact(Uuid::new_v4());
  s.create(&contact).await.unwrap();

  let fetched = ContactRepository::get(&s, contact.contact_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.contact_id, contact.contact_id);
  assert_eq!(fetched.name.given.as_deref(), Some("Alice"));
  assert_eq!(fetched.emails.len(), 1);
  assert_eq!(fetched.emails[0].value, "alice@example.com");
  assert_eq!(fetched.emails[0].label.as_deref(), Some("home"));
}

#[tokio::test]
async fn get_missing_contact_returns_none() {
  let s = store().await;
  let result = ContactRepository::get(&s, Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn list_is_scoped_by_owner() {
  let s = store().await;
  let owner = Uuid::new_v4();
  s.create(&sample_contact(owner)).await.unwrap();
  s.create(&sample_contact(owner)).await.unwrap();
  s.create(&sample_contact(Uuid::new_v4())).await.unwrap();

  let listed = ContactRepository::list(&s, owner).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert!(listed.iter().all(|c| c.owner_id == owner));
}

#[tokio::test]
async fn replace_overwrites_scalars_and_collections() {
  let s = store().await;
  let mut contact = sample_contact(Uuid::new_v4());
  s.create(&contact).await.unwrap();

  contact.name.given = Some("Alicia".into());
  contact.emails.clear();
  contact.phones.push(TypedEntry::new("+1 555 0100"));
  contact.updated_at = Utc::now();
  s.replace(&contact).await.unwrap();

  let fetched = ContactRepository::get(&s, contact.contact_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.name.given.as_deref(), Some("Alicia"));
  assert!(fetched.emails.is_empty());
  assert_eq!(fetched.phones.len(), 1);
}

#[tokio::test]
async fn set_uid_does_not_touch_updated_at() {
  let s = store().await;
  let contact = sample_contact(Uuid::new_v4());
  s.create(&contact).await.unwrap();

  s.set_uid(contact.contact_id, "new-uid-123").await.unwrap();

  let fetched = ContactRepository::get(&s, contact.contact_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.uid.as_deref(), Some("new-uid-123"));
  assert_eq!(fetched.updated_at, contact.updated_at);
}

#[tokio::test]
async fn sync_eligible_unmapped_excludes_mapped_contacts() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let conn = seed_connection(&s, owner).await;

  let mapped = sample_contact(owner);
  let unmapped = sample_contact(owner);
  s.create(&mapped).await.unwrap();
  s.create(&unmapped).await.unwrap();
  // other owner; never eligible for this connection
  s.create(&sample_contact(Uuid::new_v4())).await.unwrap();

  let mapping = Mapping::synced(
    conn.connection_id,
    mapped.contact_id,
    "uid-1",
    "/books/x/1.vcf",
    Some("\"e1\"".into()),
    Utc::now(),
  );
  MappingStore::upsert(&s, &mapping).await.unwrap();

  let eligible = s.sync_eligible_unmapped(conn.connection_id).await.unwrap();
  assert_eq!(eligible.len(), 1);
  assert_eq!(eligible[0].contact_id, unmapped.contact_id);
}

// ─── Mappings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mapping_upsert_and_load_round_trip() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let conn = seed_connection(&s, owner).await;
  let contact = sample_contact(owner);
  s.create(&contact).await.unwrap();

  let mut mapping = Mapping::synced(
    conn.connection_id,
    contact.contact_id,
    "uid-1",
    "/books/x/1.vcf",
    Some("\"e1\"".into()),
    Utc::now(),
  );
  mapping.local_hash = Some("aaaa".into());
  MappingStore::upsert(&s, &mapping).await.unwrap();

  let loaded = s.load_for_connection(conn.connection_id).await.unwrap();
  assert_eq!(loaded.len(), 1);
  assert_eq!(loaded[0].remote_uid, "uid-1");
  assert_eq!(loaded[0].status, MappingStatus::Synced);
  assert_eq!(loaded[0].local_hash.as_deref(), Some("aaaa"));

  // second upsert with the same id updates in place
  mapping.status = MappingStatus::Conflict;
  mapping.etag = Some("\"e2\"".into());
  MappingStore::upsert(&s, &mapping).await.unwrap();

  let loaded = s.load_for_connection(conn.connection_id).await.unwrap();
  assert_eq!(loaded.len(), 1);
  assert_eq!(loaded[0].status, MappingStatus::Conflict);
  assert_eq!(loaded[0].etag.as_deref(), Some("\"e2\""));
}

#[tokio::test]
async fn duplicate_remote_uid_for_connection_is_rejected() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let conn = seed_connection(&s, owner).await;
  let a = sample_contact(owner);
  let b = sample_contact(owner);
  s.create(&a).await.unwrap();
  s.create(&b).await.unwrap();

  let first = Mapping::synced(
    conn.connection_id,
    a.contact_id,
    "uid-1",
    "/books/x/1.vcf",
    None,
    Utc::now(),
  );
  MappingStore::upsert(&s, &first).await.unwrap();

  let second = Mapping::synced(
    conn.connection_id,
    b.contact_id,
    "uid-1",
    "/books/x/2.vcf",
    None,
    Utc::now(),
  );
  assert!(MappingStore::upsert(&s, &second).await.is_err());
}

#[tokio::test]
async fn rewrite_remote_uid_updates_only_the_uid() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let conn = seed_connection(&s, owner).await;
  let contact = sample_contact(owner);
  s.create(&contact).await.unwrap();

  let mapping = Mapping::synced(
    conn.connection_id,
    contact.contact_id,
    "client-uid",
    "/books/x/1.vcf",
    Some("\"e1\"".into()),
    Utc::now(),
  );
  MappingStore::upsert(&s, &mapping).await.unwrap();

  s.rewrite_remote_uid(mapping.mapping_id, "server-uid")
    .await
    .unwrap();

  let loaded = MappingStore::get(&s, mapping.mapping_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(loaded.remote_uid, "server-uid");
  assert_eq!(loaded.remote_href, "/books/x/1.vcf");
  assert_eq!(loaded.etag.as_deref(), Some("\"e1\""));
}

// ─── Pending imports ─────────────────────────────────────────────────────────

fn sample_import(connection_id: Uuid, remote_uid: &str) -> PendingImport {
  PendingImport {
    import_id: Uuid::new_v4(),
    connection_id,
    remote_uid: remote_uid.to_owned(),
    remote_href: format!("/books/x/{remote_uid}.vcf"),
    etag: Some("\"e1\"".into()),
    payload: "BEGIN:VCARD\r\nEND:VCARD\r\n".into(),
    display_name: Some("Bob".into()),
    created_at: Utc::now(),
  }
}

#[tokio::test]
async fn pending_import_is_deduplicated_by_remote_uid() {
  let s = store().await;
  let conn = seed_connection(&s, Uuid::new_v4()).await;

  let first = sample_import(conn.connection_id, "uid-9");
  assert!(s.add_pending_import(&first).await.unwrap());

  // same remote UID, different import_id: must be a no-op
  let dup = sample_import(conn.connection_id, "uid-9");
  assert!(!s.add_pending_import(&dup).await.unwrap());

  let listed = s.list_pending_imports(conn.connection_id).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].import_id, first.import_id);
}

#[tokio::test]
async fn pending_import_delete_allows_requeue() {
  let s = store().await;
  let conn = seed_connection(&s, Uuid::new_v4()).await;

  let first = sample_import(conn.connection_id, "uid-9");
  assert!(s.add_pending_import(&first).await.unwrap());
  s.delete_pending_import(first.import_id).await.unwrap();

  let again = sample_import(conn.connection_id, "uid-9");
  assert!(s.add_pending_import(&again).await.unwrap());
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn conflict_round_trip_and_delete() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let conn = seed_connection(&s, owner).await;
  let contact = sample_contact(owner);
  s.create(&contact).await.unwrap();

  let mapping = Mapping::synced(
    conn.connection_id,
    contact.contact_id,
    "uid-1",
    "/books/x/1.vcf",
    None,
    Utc::now(),
  );
  MappingStore::upsert(&s, &mapping).await.unwrap();

  let conflict = Conflict {
    conflict_id: Uuid::new_v4(),
    mapping_id: mapping.mapping_id,
    connection_id: conn.connection_id,
    contact_id: contact.contact_id,
    local_snapshot: "BEGIN:VCARD\r\nFN:Local\r\nEND:VCARD\r\n".into(),
    remote_snapshot: "BEGIN:VCARD\r\nFN:Remote\r\nEND:VCARD\r\n".into(),
    remote_etag: Some("\"e2\"".into()),
    detected_at: Utc::now(),
  };
  s.add_conflict(&conflict).await.unwrap();

  let listed = s.list_conflicts(conn.connection_id).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].conflict_id, conflict.conflict_id);
  assert!(listed[0].local_snapshot.contains("FN:Local"));

  s.delete_conflict(conflict.conflict_id).await.unwrap();
  let listed = s.list_conflicts(conn.connection_id).await.unwrap();
  assert!(listed.is_empty());
}

// ─── Connections ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn connection_upsert_and_health_markers() {
  let s = store().await;
  let mut conn = Connection::new(Uuid::new_v4(), "https://dav.example.com");
  conn.username = "alice".into();
  ConnectionStore::upsert(&s, &conn).await.unwrap();

  let at = Utc::now();
  s.record_error(conn.connection_id, "503 at /books", at)
    .await
    .unwrap();
  let fetched = ConnectionStore::get(&s, conn.connection_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.last_error.as_deref(), Some("503 at /books"));
  assert!(fetched.last_error_at.is_some());
  assert!(fetched.last_synced_at.is_none());

  s.record_success(conn.connection_id, Utc::now())
    .await
    .unwrap();
  let fetched = ConnectionStore::get(&s, conn.connection_id)
    .await
    .unwrap()
    .unwrap();
  assert!(fetched.last_error.is_none());
  assert!(fetched.last_error_at.is_none());
  assert!(fetched.last_synced_at.is_some());
}

#[tokio::test]
async fn record_error_on_missing_connection_fails() {
  let s = store().await;
  let result = s.record_error(Uuid::new_v4(), "boom", Utc::now()).await;
  assert!(result.is_err());
}
