//! `carden` — command-line front end for the carden sync engine.
//!
//! Reads `config.toml` (or the path given with `--config`, or `CARDEN_*`
//! environment variables), opens the SQLite store, and runs sync passes or
//! review actions against configured CardDAV connections.
//!
//! # Usage
//!
//! ```
//! carden add-connection --server-url https://dav.example.com \
//!     --username alice --password secret
//! carden sync <connection-id>
//! carden status <connection-id>
//! carden resolve <conflict-id> --keep local
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use carden_core::{
  connection::Connection,
  mapping::Resolution,
  store::{ConnectionStore, MappingStore},
  sync::{Progress, ProgressSink},
};
use carden_dav::{DavClient, DavConfig};
use carden_store_sqlite::SqliteStore;
use carden_sync::SyncEngine;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "carden", version, about = "CardDAV contact sync")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List configured connections and their health.
  Connections,

  /// Add a CardDAV connection.
  AddConnection {
    #[arg(long)]
    server_url: String,
    #[arg(long)]
    username:   String,
    #[arg(long)]
    password:   String,
    /// Owner of the synced contacts; generated and printed when omitted.
    #[arg(long)]
    owner:      Option<Uuid>,
  },

  /// Run a full bidirectional pass (pull, then push).
  Sync { connection_id: Uuid },

  /// Pull remote changes only.
  Pull { connection_id: Uuid },

  /// Push local changes only.
  Push { connection_id: Uuid },

  /// Show pending imports, open conflicts, and health for a connection.
  Status { connection_id: Uuid },

  /// Accept a pending import into the local contact list.
  AcceptImport { import_id: Uuid },

  /// Discard a pending import.
  DiscardImport { import_id: Uuid },

  /// Resolve a conflict by keeping one whole side.
  Resolve {
    conflict_id: Uuid,
    #[arg(long, value_enum)]
    keep:        Keep,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum Keep {
  Local,
  Remote,
}

impl From<Keep> for Resolution {
  fn from(keep: Keep) -> Self {
    match keep {
      Keep::Local => Resolution::KeepLocal,
      Keep::Remote => Resolution::KeepRemote,
    }
  }
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CliConfig {
  #[serde(default = "default_store_path")]
  store_path: String,
}

fn default_store_path() -> String { "carden.db".to_string() }

// ─── Progress ────────────────────────────────────────────────────────────────

/// Prints advisory progress to stderr so stdout stays machine-readable.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
  fn progress(&self, event: &Progress) {
    match event.total {
      0 => eprintln!("[{}]", event.phase),
      _ => eprintln!(
        "[{} {}/{}] {}",
        event.phase,
        event.current,
        event.total,
        event.label.as_deref().unwrap_or("")
      ),
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CARDEN"))
    .build()
    .context("failed to read configuration")?;
  let cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {}", cfg.store_path))?;

  match cli.command {
    Command::Connections => {
      for conn in ConnectionStore::list(&store).await? {
        let health = match (&conn.last_error, conn.last_synced_at) {
          (Some(err), _) => format!("error: {err}"),
          (None, Some(at)) => format!("last synced {at}"),
          (None, None) => "never synced".to_string(),
        };
        println!(
          "{}  {}  {}  {}",
          conn.connection_id,
          conn.server_url,
          if conn.sync_enabled { "enabled" } else { "disabled" },
          health
        );
      }
    }

    Command::AddConnection {
      server_url,
      username,
      password,
      owner,
    } => {
      let owner_id = owner.unwrap_or_else(Uuid::new_v4);
      let mut conn = Connection::new(owner_id, server_url);
      conn.username = username;
      conn.password = password;
      ConnectionStore::upsert(&store, &conn).await?;
      println!("connection {}", conn.connection_id);
      println!("owner      {owner_id}");
    }

    Command::Sync { connection_id } => {
      let result = engine(&store, connection_id).await?.sync(connection_id).await?;
      print_result(&result);
    }
    Command::Pull { connection_id } => {
      let result = engine(&store, connection_id).await?.pull(connection_id).await?;
      print_result(&result);
    }
    Command::Push { connection_id } => {
      let result = engine(&store, connection_id).await?.push(connection_id).await?;
      print_result(&result);
    }

    Command::Status { connection_id } => {
      let conn = ConnectionStore::get(&store, connection_id)
        .await?
        .context("no such connection")?;
      println!("server        {}", conn.server_url);
      println!("sync enabled  {}", conn.sync_enabled);
      match conn.last_synced_at {
        Some(at) => println!("last synced   {at}"),
        None => println!("last synced   never"),
      }
      if let Some(err) = &conn.last_error {
        println!("last error    {err}");
      }

      let imports = store.list_pending_imports(connection_id).await?;
      println!("pending imports ({}):", imports.len());
      for import in imports {
        println!(
          "  {}  {}  {}",
          import.import_id,
          import.display_name.as_deref().unwrap_or("(unnamed)"),
          import.remote_href
        );
      }

      let conflicts = store.list_conflicts(connection_id).await?;
      println!("conflicts ({}):", conflicts.len());
      for conflict in conflicts {
        println!(
          "  {}  contact {}  detected {}",
          conflict.conflict_id, conflict.contact_id, conflict.detected_at
        );
      }
    }

    Command::AcceptImport { import_id } => {
      let import = store
        .get_pending_import(import_id)
        .await?
        .context("no such pending import")?;
      let contact_id = engine(&store, import.connection_id)
        .await?
        .accept_import(import_id)
        .await?;
      println!("contact {contact_id}");
    }

    Command::DiscardImport { import_id } => {
      let import = store
        .get_pending_import(import_id)
        .await?
        .context("no such pending import")?;
      engine(&store, import.connection_id)
        .await?
        .discard_import(import_id)
        .await?;
    }

    Command::Resolve { conflict_id, keep } => {
      let conflict = store
        .get_conflict(conflict_id)
        .await?
        .context("no such conflict")?;
      engine(&store, conflict.connection_id)
        .await?
        .resolve_conflict(conflict_id, keep.into())
        .await?;
      println!("resolved {conflict_id}");
    }
  }

  Ok(())
}

/// Build a sync engine for one connection's server.
async fn engine(
  store: &SqliteStore,
  connection_id: Uuid,
) -> anyhow::Result<SyncEngine<SqliteStore, DavClient, ConsoleProgress>> {
  let conn = ConnectionStore::get(store, connection_id)
    .await?
    .context("no such connection")?;
  let client = DavClient::new(DavConfig {
    base_url: conn.server_url.clone(),
    username: conn.username.clone(),
    password: conn.password.clone(),
  })
  .map_err(|e| anyhow::anyhow!("dav client: {e}"))?;
  Ok(SyncEngine::with_progress(
    store.clone(),
    client,
    ConsoleProgress,
  ))
}

fn print_result(result: &carden_core::sync::SyncResult) {
  println!("pending imports   {}", result.pending_imports);
  println!("exported          {}", result.exported);
  println!("updated locally   {}", result.updated_locally);
  println!("updated remotely  {}", result.updated_remotely);
  println!("conflicts         {}", result.conflicts);
  println!("errors            {}", result.errors);
  for message in &result.messages {
    eprintln!("error: {message}");
  }
}
