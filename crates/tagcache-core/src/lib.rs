//! tagcache - SQLite-backed cache with TTL expiry and tag invalidation.
//!
//! Values are encoded by a configurable serializer, stored under namespaced keys,
//! and can be invalidated one by one, by tag, or in bulk. Expired records stay
//! invisible to reads until `purge` reaps them.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tagcache_core::{CacheAdapter, CacheOptions, SqliteCache};
//!
//! # fn main() -> tagcache_core::Result<()> {
//! let cache = SqliteCache::open_in_memory(CacheOptions::default())?;
//! cache.create_indexes()?;
//!
//! cache.save(&vec![1, 2, 3], "numbers", &["lists"], Some(Duration::from_secs(60)))?;
//! let numbers: Option<Vec<i32>> = cache.load_key("numbers")?;
//! assert_eq!(numbers, Some(vec![1, 2, 3]));
//!
//! assert!(cache.clean(&["lists"])?);
//! assert!(!cache.contains("numbers")?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod keys;
pub mod serializer;
pub mod sql;

// Re-export commonly used types
pub use cache::{CacheAdapter, CacheRecord, CacheStats, LoadKind, Loaded, SqliteCache};
pub use config::{CacheOptions, IndexOptions};
pub use error::{CacheError, Result};
pub use executor::StatementExecutor;
pub use keys::KeyMapper;
pub use serializer::{Serializer, SerializerKind};
