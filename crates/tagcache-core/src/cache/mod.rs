//! Tagged cache abstraction.
//!
//! [`CacheAdapter`] is the contract callers program against; [`SqliteCache`] is the
//! relational implementation. Records live in one table per cache configuration,
//! with tag membership kept in a companion `<table>_tags` table.

mod sqlite;
mod traits;

pub use sqlite::SqliteCache;
pub use traits::{CacheAdapter, CacheRecord, CacheStats, LoadKind, Loaded};
