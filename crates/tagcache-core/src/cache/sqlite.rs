//! SQLite-backed tagged cache.

use super::traits::{CacheAdapter, CacheRecord, CacheStats};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::executor::{Scope, StatementExecutor};
use crate::keys::KeyMapper;
use crate::serializer::{Serializer, SerializerKind};
use crate::sql::SqlDefinitions;
use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, Row, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tagged cache over a SQLite table.
///
/// The connection is supplied by the caller and shared; the cache locks it per
/// operation and never closes it. Writes that touch more than one row run inside a
/// savepoint, so a record and its tag rows always change together.
pub struct SqliteCache {
    executor: StatementExecutor,
    options: CacheOptions,
    mapper: KeyMapper,
    serializer: Option<Serializer>,
    sql: SqlDefinitions,
}

impl SqliteCache {
    /// Build a cache over an open connection, creating its tables if needed.
    pub fn new(conn: Arc<Mutex<Connection>>, options: CacheOptions) -> Result<Self> {
        options.validate()?;

        let cache = Self {
            executor: StatementExecutor::new(conn),
            mapper: KeyMapper::from_options(&options),
            serializer: Serializer::from_kind(options.serializer),
            sql: SqlDefinitions::new(&options.db_table),
            options,
        };

        cache.init_schema()?;

        Ok(cache)
    }

    /// Open (or create) a database file and build a cache over it.
    pub fn open(db_path: impl AsRef<Path>, options: CacheOptions) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| CacheError::database("Failed to open cache database", e))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )
        .map_err(|e| CacheError::database("Failed to set pragmas", e))?;

        Self::new(Arc::new(Mutex::new(conn)), options)
    }

    /// Build a cache over a private in-memory database.
    pub fn open_in_memory(options: CacheOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::database("Failed to open in-memory database", e))?;
        Self::new(Arc::new(Mutex::new(conn)), options)
    }

    fn init_schema(&self) -> Result<()> {
        self.executor.execute_batch(&self.sql.init)
    }

    /// Create the secondary indexes enabled in the options.
    pub fn create_indexes(&self) -> Result<&Self> {
        let indexes = self.options.indexes;
        self.create_index(indexes.key, "key", &self.sql.key_index)?;
        self.create_index(indexes.expiry, "expiry", &self.sql.expiry_index)?;
        self.create_index(indexes.tag, "tag", &self.sql.tag_index)?;

        Ok(self)
    }

    fn create_index(&self, enabled: bool, name: &str, sql: &str) -> Result<()> {
        if enabled {
            self.executor.execute_batch(sql)?;
            info!("Ensured {} index on {}", name, self.sql.table());
        }
        Ok(())
    }

    /// Replace the options, re-selecting the serializer and ensuring the tables exist.
    pub fn set_options(&mut self, options: CacheOptions) -> Result<()> {
        options.validate()?;

        let sql = SqlDefinitions::new(&options.db_table);
        self.executor.execute_batch(&sql.init)?;

        self.mapper = KeyMapper::from_options(&options);
        self.serializer = Serializer::from_kind(options.serializer);
        self.sql = sql;
        self.options = options;

        Ok(())
    }

    /// The shared connection handle this cache runs on.
    pub fn adapter(&self) -> &Arc<Mutex<Connection>> {
        self.executor.connection()
    }

    /// Switch the payload encoder. Existing rows are not re-encoded.
    pub fn set_serializer(&mut self, kind: SerializerKind) {
        self.options.serializer = kind;
        self.serializer = Serializer::from_kind(kind);
    }

    /// Key and tag namespacing used by this cache.
    pub fn mapper(&self) -> &KeyMapper {
        &self.mapper
    }

    /// Store a raw payload with an absolute expiry.
    pub fn save_with_expiry(
        &self,
        data: Option<&[u8]>,
        key: &str,
        tags: &[&str],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mapped = self.mapper.map_key(key);
        let mapped_tags = self.tags_for_save(tags);
        let joined = (!mapped_tags.is_empty()).then(|| mapped_tags.join(", "));
        let exp = expires_at.map(|t| t.timestamp_millis());
        let dated = self.timestamp(None);

        let affected = self.executor.transaction(|scope| {
            let affected = scope.execute(
                &self.sql.upsert,
                named_params! {
                    ":key": mapped,
                    ":data": data,
                    ":tags": joined,
                    ":exp": exp,
                    ":dated": dated,
                },
            )?;

            scope.execute(&self.sql.delete_key_tags, named_params! { ":key": mapped })?;
            for tag in &mapped_tags {
                scope.execute(
                    &self.sql.insert_tag,
                    named_params! { ":key": mapped, ":tag": tag },
                )?;
            }

            Ok(affected)
        })?;

        debug!("Saved {} with {} tag(s)", mapped, mapped_tags.len());

        Ok(affected == 1)
    }

    /// Mapped, de-duplicated tags to record, in the order given.
    fn tags_for_save(&self, tags: &[&str]) -> Vec<String> {
        if tags.is_empty() {
            return Vec::new();
        }

        if !self.options.tag_enable {
            warn!("Tagging is disabled; ignoring {} tag(s)", tags.len());
            return Vec::new();
        }

        let mut mapped: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = self.mapper.map_tag(tag);
            if !mapped.contains(&tag) {
                mapped.push(tag);
            }
        }
        mapped
    }

    /// The live record stored under `key`, with its exact tag list.
    pub fn load_record(&self, key: &str) -> Result<Option<CacheRecord>> {
        let mapped = self.mapper.map_key(key);
        let now = now_millis();

        self.executor.run(|scope| {
            let record = scope.query_row(
                &self.sql.load_key,
                named_params! { ":key": mapped, ":now": now },
                record_from_row,
            )?;

            match record {
                Some(mut record) => {
                    record.tags = self.key_tags(scope, &mapped)?;
                    Ok(Some(record))
                }
                None => Ok(None),
            }
        })
    }

    fn key_tags(&self, scope: &Scope<'_>, mapped: &str) -> Result<Vec<String>> {
        scope.query_all(
            &self.sql.key_tags,
            named_params! { ":key": mapped },
            |row| row.get(0),
        )
    }

    /// Row counts for the cache table.
    pub fn stats(&self) -> Result<CacheStats> {
        let now = now_millis();

        self.executor.run(|scope| {
            let (total, live, tagged): (i64, i64, i64) = scope
                .query_row(&self.sql.stats, named_params! { ":now": now }, |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .unwrap_or_default();
            let distinct: i64 = scope
                .query_row(&self.sql.distinct_tags, [], |row| row.get(0))?
                .unwrap_or(0);

            Ok(CacheStats {
                total_entries: total as usize,
                live_entries: live as usize,
                expired_entries: (total - live) as usize,
                tagged_entries: tagged as usize,
                distinct_tags: distinct as usize,
            })
        })
    }

    /// Remove tag rows whose record is gone.
    fn sweep_tags(&self, scope: &Scope<'_>) -> Result<()> {
        let swept = scope.execute(&self.sql.delete_orphan_tags, [])?;
        if swept > 0 {
            debug!("Removed {} orphaned tag rows", swept);
        }
        Ok(())
    }
}

impl CacheAdapter for SqliteCache {
    fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mapped = self.mapper.map_key(key);
        let row: Option<Option<Vec<u8>>> = self.executor.query_row(
            &self.sql.load_data,
            named_params! { ":key": mapped, ":now": now_millis() },
            |row| row.get(0),
        )?;

        match row {
            Some(Some(data)) => Ok(Some(data)),
            // Saved without a payload: present, but nothing to return.
            Some(None) => Ok(None),
            None => Ok(None),
        }
    }

    fn load_tag(&self, tag: &str) -> Result<Option<Vec<String>>> {
        let mapped = self.mapper.map_tag(tag);
        let keys: Vec<String> = self.executor.query_all(
            &self.sql.load_tag,
            named_params! { ":tag": mapped, ":now": now_millis() },
            |row| row.get(0),
        )?;

        Ok(if keys.is_empty() { None } else { Some(keys) })
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let mapped = self.mapper.map_key(key);
        let found = self.executor.query_row(
            &self.sql.exists,
            named_params! { ":key": mapped, ":now": now_millis() },
            |_| Ok(()),
        )?;

        Ok(found.is_some())
    }

    fn save_raw(
        &self,
        data: Option<&[u8]>,
        key: &str,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let expires_at = match ttl {
            Some(ttl) if !ttl.is_zero() => {
                let expires_at = chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or_else(|| CacheError::Validation {
                        field: "ttl".to_string(),
                        message: format!("{}s is past the latest representable date", ttl.as_secs()),
                    })?;
                Some(expires_at)
            }
            _ => None,
        };

        self.save_with_expiry(data, key, tags, expires_at)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mapped = self.mapper.map_key(key);

        let deleted = self.executor.transaction(|scope| {
            let deleted = scope.execute(&self.sql.delete, named_params! { ":key": mapped })?;
            scope.execute(&self.sql.delete_key_tags, named_params! { ":key": mapped })?;
            Ok(deleted)
        })?;

        Ok(deleted > 0)
    }

    fn clean(&self, tags: &[&str]) -> Result<bool> {
        if tags.is_empty() {
            return Err(CacheError::Validation {
                field: "tags".to_string(),
                message: "at least one tag is required".to_string(),
            });
        }

        let names = SqlDefinitions::tag_params(tags.len());
        let mapped: Vec<String> = tags.iter().map(|t| self.mapper.map_tag(t)).collect();
        let bound: Vec<(&str, &dyn ToSql)> = names
            .iter()
            .map(String::as_str)
            .zip(mapped.iter().map(|t| t as &dyn ToSql))
            .collect();
        let sql = self.sql.clean(tags.len());

        let removed = self.executor.transaction(|scope| {
            let removed = scope.execute(&sql, bound.as_slice())?;
            if removed > 0 {
                self.sweep_tags(scope)?;
            }
            Ok(removed)
        })?;

        debug!("Cleaned {} entries for {} tag(s)", removed, tags.len());

        Ok(removed > 0)
    }

    fn flush(&self, all: bool) -> Result<bool> {
        if all {
            self.executor
                .transaction(|scope| scope.execute_batch(&self.sql.flush_all))?;
            debug!("Flushed all entries from {}", self.sql.table());
            return Ok(true);
        }

        // Rows already past expiry are left for purge.
        let removed = self.executor.transaction(|scope| {
            let removed = scope.execute(&self.sql.flush, named_params! { ":now": now_millis() })?;
            if removed > 0 {
                self.sweep_tags(scope)?;
            }
            Ok(removed)
        })?;

        debug!("Flushed {} live entries from {}", removed, self.sql.table());

        Ok(removed > 0)
    }

    fn purge(&self, extra: Duration) -> Result<bool> {
        let extra = i64::try_from(extra.as_millis()).unwrap_or(i64::MAX);
        let time = now_millis().saturating_add(extra);

        let purged = self.executor.transaction(|scope| {
            let purged = scope.execute(&self.sql.purge, named_params! { ":time": time })?;
            if purged > 0 {
                self.sweep_tags(scope)?;
            }
            Ok(purged)
        })?;

        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }

        Ok(true)
    }

    fn options(&self) -> &CacheOptions {
        &self.options
    }

    fn serializer(&self) -> Option<Serializer> {
        self.serializer
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CacheRecord> {
    let expires_at: Option<i64> = row.get(3)?;

    Ok(CacheRecord {
        key: row.get(0)?,
        data: row.get(1)?,
        tags: Vec::new(),
        expires_at: expires_at.and_then(DateTime::from_timestamp_millis),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
