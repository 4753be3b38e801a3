//! CardDAV protocol client for carden.
//!
//! Implements the [`carden_core::store::AddressBook`] trait over plain HTTP:
//! PROPFIND-based discovery and listing, GET/PUT with etag preconditions, and
//! bounded retry for transient failures.

mod client;
mod retry;
mod xml;

pub use client::{DavClient, DavConfig};
pub use retry::with_retry;
