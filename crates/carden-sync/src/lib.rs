//! Bidirectional contact synchronization between local storage and a
//! CardDAV address book.
//!
//! The engine is generic over the storage traits and the [`AddressBook`]
//! protocol client from `carden-core`, which is what makes it testable
//! against an in-memory store and a scripted fake server.
//!
//! [`AddressBook`]: carden_core::store::AddressBook

mod classify;
mod conflict;
mod engine;
mod imports;
mod index;
mod pull;
mod push;

pub mod error;
pub mod hash;

pub use engine::SyncEngine;
pub use error::{Error, Result};
