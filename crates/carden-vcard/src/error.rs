//! Error types for the carden-vcard codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("vCard missing BEGIN/END:VCARD envelope")]
  MissingEnvelope,

  #[error("malformed content-line: {0}")]
  MalformedContentLine(String),

  #[error("invalid date in {property}: {value}")]
  InvalidDate { property: String, value: String },

  /// Serialization requires a stable UID; callers must assign one first.
  #[error("contact has no UID")]
  MissingUid,

  #[error("invalid base64 photo payload: {0}")]
  InvalidPhoto(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
