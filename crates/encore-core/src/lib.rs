//! Core records and storage for encore.
//!
//! This crate defines the normalized records produced by an archive import
//! (shows, search rows, recordings, collections), the user-owned library
//! state that must survive re-imports, the [`RecordStore`] contract the
//! import pipeline writes through, and a SQLite-backed implementation of it.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use schema::Database;
pub use store::RecordStore;
