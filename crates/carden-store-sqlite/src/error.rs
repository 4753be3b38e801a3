//! Error type for `carden-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {field}: {value:?}")]
  UnknownDiscriminant { field: &'static str, value: String },

  #[error("connection not found: {0}")]
  ConnectionNotFound(uuid::Uuid),

  #[error("contact not found: {0}")]
  ContactNotFound(uuid::Uuid),

  #[error("mapping not found: {0}")]
  MappingNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
