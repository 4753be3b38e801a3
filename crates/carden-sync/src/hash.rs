//! Content hashing.
//!
//! Hashes, not timestamps, decide whether content actually changed. Both
//! sides hash the serialized vCard text: the local hash covers the contact as
//! we would export it, the remote hash covers the body as fetched.

use carden_core::contact::Contact;
use sha2::{Digest, Sha256};

pub fn sha256_hex(data: &[u8]) -> String {
  hex::encode(Sha256::digest(data))
}

/// Hash of the contact's exported representation. `None` when the contact
/// cannot be serialized yet (no UID) — callers treat that as "changed".
pub fn local_hash(contact: &Contact) -> Option<String> {
  carden_vcard::serialize(contact)
    .ok()
    .map(|body| sha256_hex(body.as_bytes()))
}
