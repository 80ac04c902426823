//! SQLite schema and the [`Database`] record store.

mod db;
pub mod migrations;

pub use db::Database;
