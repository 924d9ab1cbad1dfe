//! Persistence layer for flags, types and votes
//!
//! Provides SQLite-backed storage shared by any number of client processes.

mod schema;
mod sqlite_store;

pub use schema::{Schema, SCHEMA_VERSION};
pub use sqlite_store::{SqliteStore, StoreOptions};
