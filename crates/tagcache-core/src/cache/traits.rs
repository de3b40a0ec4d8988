//! Cache contract and shared types.

use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::serializer::Serializer;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored record, as read back from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Mapped (prefixed) key.
    pub key: String,
    /// Encoded payload. `None` when the record was saved without data.
    pub data: Option<Vec<u8>>,
    /// Mapped tags attached to the record.
    pub tags: Vec<String>,
    /// Absolute expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Formatted creation timestamp.
    pub created_at: String,
    /// Formatted timestamp of the last save.
    pub updated_at: String,
}

/// Row counts for a cache table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Rows physically stored, expired or not.
    pub total_entries: usize,
    /// Rows visible to reads.
    pub live_entries: usize,
    /// Rows past expiry that `purge` would reap.
    pub expired_entries: usize,
    /// Rows carrying at least one tag.
    pub tagged_entries: usize,
    /// Distinct tags across all rows.
    pub distinct_tags: usize,
}

/// What [`CacheAdapter::load`] looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadKind {
    #[default]
    Key,
    Tag,
}

/// Result of [`CacheAdapter::load`].
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    /// Decoded value stored under a key.
    Value(T),
    /// Mapped keys carrying a tag.
    Keys(Vec<String>),
}

/// Tagged cache contract.
///
/// Backends store opaque payloads; the provided typed methods encode and decode
/// through the configured [`Serializer`]. All operations are synchronous.
pub trait CacheAdapter: Send + Sync {
    /// Raw payload stored under `key`, or `None` if absent, expired or saved without data.
    fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Mapped keys of live records carrying `tag`, or `None` if there are none.
    fn load_tag(&self, tag: &str) -> Result<Option<Vec<String>>>;

    /// Whether a live record exists for `key`, regardless of its payload.
    fn contains(&self, key: &str) -> Result<bool>;

    /// Store a raw payload, replacing any record under the same key.
    ///
    /// An empty `tags` slice records no tags. A zero or missing `ttl` means the
    /// record never expires.
    fn save_raw(
        &self,
        data: Option<&[u8]>,
        key: &str,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> Result<bool>;

    /// Delete the record under `key`. Returns `false` if there was none.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every record carrying any of `tags`.
    fn clean(&self, tags: &[&str]) -> Result<bool>;

    /// Delete live records, or every record when `all` is set.
    fn flush(&self, all: bool) -> Result<bool>;

    /// Reap records that expired, or will expire within `extra`.
    fn purge(&self, extra: Duration) -> Result<bool>;

    fn options(&self) -> &CacheOptions;

    /// Active payload encoder, `None` when storing raw bytes.
    fn serializer(&self) -> Option<Serializer>;

    /// Format `time` (or now) with the configured timestamp format.
    fn timestamp(&self, time: Option<DateTime<Utc>>) -> String {
        time.unwrap_or_else(Utc::now)
            .format(&self.options().format_timestamp)
            .to_string()
    }

    /// Option value by field name.
    fn get_option(&self, name: &str) -> Option<serde_json::Value> {
        self.options().get(name)
    }

    /// Encode `value` and store it under `key`.
    fn save<T>(&self, value: &T, key: &str, tags: &[&str], ttl: Option<Duration>) -> Result<bool>
    where
        Self: Sized,
        T: Serialize + ?Sized,
    {
        let data = require_serializer(self.serializer())?.serialize(value)?;
        self.save_raw(Some(data.as_slice()), key, tags, ttl)
    }

    /// Decode the value stored under `key`.
    fn load_key<T>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
        T: DeserializeOwned,
    {
        let serializer = require_serializer(self.serializer())?;
        match self.load_raw(key)? {
            Some(data) => Ok(Some(serializer.deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Load by key or by tag.
    fn load<T>(&self, key: &str, kind: LoadKind) -> Result<Option<Loaded<T>>>
    where
        Self: Sized,
        T: DeserializeOwned,
    {
        match kind {
            LoadKind::Key => Ok(self.load_key(key)?.map(Loaded::Value)),
            LoadKind::Tag => Ok(self.load_tag(key)?.map(Loaded::Keys)),
        }
    }
}

fn require_serializer(serializer: Option<Serializer>) -> Result<Serializer> {
    serializer.ok_or_else(|| {
        CacheError::config("No serializer configured; use save_raw/load_raw for raw payloads")
    })
}
