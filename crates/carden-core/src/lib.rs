//! Core types and trait definitions for the carden sync engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod connection;
pub mod contact;
pub mod error;
pub mod mapping;
pub mod store;
pub mod sync;

pub use error::RemoteError;
