//! SQL schema for the carden SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS contacts (
    contact_id   TEXT PRIMARY KEY,
    owner_id     TEXT NOT NULL,
    uid          TEXT,            -- vCard UID; NULL until first export/import
    created_at   TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at   TEXT NOT NULL,
    payload_json TEXT NOT NULL    -- full Contact, JSON
);

CREATE TABLE IF NOT EXISTS connections (
    connection_id         TEXT PRIMARY KEY,
    owner_id              TEXT NOT NULL,
    server_url            TEXT NOT NULL,
    username              TEXT NOT NULL,
    password              TEXT NOT NULL,
    sync_enabled          INTEGER NOT NULL DEFAULT 1,
    auto_export_new       INTEGER NOT NULL DEFAULT 1,
    sync_interval_minutes INTEGER NOT NULL DEFAULT 60,
    import_mode           TEXT NOT NULL DEFAULT 'review',
    last_error            TEXT,
    last_error_at         TEXT,
    last_synced_at        TEXT
);

-- One row per (connection, contact) correlation. The two UNIQUE constraints
-- are the correlation invariants; violating writes must fail loudly.
CREATE TABLE IF NOT EXISTS mappings (
    mapping_id         TEXT PRIMARY KEY,
    connection_id      TEXT NOT NULL REFERENCES connections(connection_id),
    contact_id         TEXT NOT NULL REFERENCES contacts(contact_id),
    remote_uid         TEXT NOT NULL,
    remote_href        TEXT NOT NULL,
    etag               TEXT,
    status             TEXT NOT NULL,   -- 'synced' | 'pending' | 'conflict'
    local_hash         TEXT,
    remote_hash        TEXT,
    last_local_change  TEXT,
    last_remote_change TEXT,
    last_synced_at     TEXT,
    UNIQUE (connection_id, contact_id),
    UNIQUE (connection_id, remote_uid)
);

-- Unmatched remote contacts awaiting review; at most one per remote UID.
CREATE TABLE IF NOT EXISTS pending_imports (
    import_id     TEXT PRIMARY KEY,
    connection_id TEXT NOT NULL REFERENCES connections(connection_id),
    remote_uid    TEXT NOT NULL,
    remote_href   TEXT NOT NULL,
    etag          TEXT,
    payload       TEXT NOT NULL,   -- raw vCard text as fetched
    display_name  TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (connection_id, remote_uid)
);

CREATE TABLE IF NOT EXISTS conflicts (
    conflict_id     TEXT PRIMARY KEY,
    mapping_id      TEXT NOT NULL REFERENCES mappings(mapping_id),
    connection_id   TEXT NOT NULL,
    contact_id      TEXT NOT NULL,
    local_snapshot  TEXT NOT NULL,
    remote_snapshot TEXT NOT NULL,
    remote_etag     TEXT,
    detected_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS contacts_owner_idx    ON contacts(owner_id);
CREATE INDEX IF NOT EXISTS mappings_conn_idx     ON mappings(connection_id);
CREATE INDEX IF NOT EXISTS mappings_href_idx     ON mappings(connection_id, remote_href);
CREATE INDEX IF NOT EXISTS pending_conn_idx      ON pending_imports(connection_id);
CREATE INDEX IF NOT EXISTS conflicts_conn_idx    ON conflicts(connection_id);

PRAGMA user_version = 1;
";
