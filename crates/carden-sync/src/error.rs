//! Error type for `carden-sync`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("remote error: {0}")]
  Remote(#[from] carden_core::RemoteError),

  #[error("vcard error: {0}")]
  Vcard(#[from] carden_vcard::Error),

  /// Backend storage failure, boxed because the engine is generic over its
  /// store implementations.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("connection not found: {0}")]
  ConnectionNotFound(Uuid),

  /// A pass was requested on a connection whose sync toggle is off.
  #[error("sync is disabled for connection {0}")]
  ConnectionDisabled(Uuid),

  #[error("conflict not found: {0}")]
  ConflictNotFound(Uuid),

  #[error("pending import not found: {0}")]
  ImportNotFound(Uuid),

  #[error("contact not found: {0}")]
  ContactNotFound(Uuid),

  #[error("mapping not found: {0}")]
  MappingNotFound(Uuid),
}

impl Error {
  /// Wrap a backend store error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
