//! Cache configuration.
//!
//! Options are validated once when a cache is built and are read-only afterwards.
//! A partial JSON document overrides only the fields it names.

use crate::error::{CacheError, Result};
use crate::serializer::SerializerKind;
use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static TABLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Which secondary indexes `create_indexes` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Index on the mapped key column.
    pub key: bool,
    /// Index on `expires_at`.
    pub expiry: bool,
    /// Index on the tag membership table.
    pub tag: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            key: true,
            expiry: true,
            tag: true,
        }
    }
}

/// Options for a cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Prefix prepended to every cache key.
    pub prefix_key: String,
    /// Prefix prepended to every tag.
    pub prefix_tag: String,
    /// Whether tags passed to `save` are recorded.
    pub tag_enable: bool,
    /// strftime format for `created_at`/`updated_at`.
    pub format_timestamp: String,
    /// Payload encoding.
    pub serializer: SerializerKind,
    /// Storage table name.
    pub db_table: String,
    /// Secondary indexes.
    pub indexes: IndexOptions,
}

impl CacheOptions {
    pub const DEFAULT_PREFIX_KEY: &'static str = "tagcache-key:";
    pub const DEFAULT_PREFIX_TAG: &'static str = "tagcache-tag:";
    pub const DEFAULT_FORMAT_TIMESTAMP: &'static str = "%Y-%m-%d %H:%M:%S";
    pub const DEFAULT_DB_TABLE: &'static str = "cache";

    /// Parse options from JSON, filling unspecified fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: CacheOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
            message: format!("Failed to read cache options: {}", e),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;
        Self::from_json_str(&contents)
    }

    /// Check the options can be used to build a cache.
    pub fn validate(&self) -> Result<()> {
        // The table name is interpolated into statements, so it must be a plain identifier.
        if !TABLE_NAME_RE.is_match(&self.db_table) {
            return Err(CacheError::config(format!(
                "Invalid table name '{}': expected letters, digits and underscores",
                self.db_table
            )));
        }

        if self.format_timestamp.is_empty()
            || StrftimeItems::new(&self.format_timestamp).any(|item| matches!(item, Item::Error))
        {
            return Err(CacheError::config(format!(
                "Invalid timestamp format '{}'",
                self.format_timestamp
            )));
        }

        Ok(())
    }

    /// Look up an option by its field name.
    ///
    /// Nested index flags are addressed as `indexes`.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        match serde_json::to_value(self).ok()? {
            serde_json::Value::Object(mut map) => map.remove(name),
            _ => None,
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            prefix_key: Self::DEFAULT_PREFIX_KEY.to_string(),
            prefix_tag: Self::DEFAULT_PREFIX_TAG.to_string(),
            tag_enable: true,
            format_timestamp: Self::DEFAULT_FORMAT_TIMESTAMP.to_string(),
            serializer: SerializerKind::default(),
            db_table: Self::DEFAULT_DB_TABLE.to_string(),
            indexes: IndexOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let options = CacheOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.serializer, SerializerKind::Json);
        assert!(options.tag_enable);
    }

    #[test]
    fn test_partial_json_overrides() {
        let options =
            CacheOptions::from_json_str(r#"{"db_table": "app_cache", "serializer": "zstd"}"#)
                .unwrap();
        assert_eq!(options.db_table, "app_cache");
        assert_eq!(options.serializer, SerializerKind::Zstd);
        assert_eq!(options.prefix_key, CacheOptions::DEFAULT_PREFIX_KEY);
        assert!(options.indexes.tag);
    }

    #[test]
    fn test_unknown_serializer_rejected() {
        let err = CacheOptions::from_json_str(r#"{"serializer": "php"}"#).unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }

    #[test]
    fn test_bad_table_name_rejected() {
        for name in ["", "cache; DROP TABLE x", "1cache", "my-cache"] {
            let options = CacheOptions {
                db_table: name.to_string(),
                ..Default::default()
            };
            assert!(options.validate().is_err(), "accepted {:?}", name);
        }
    }

    #[test]
    fn test_bad_timestamp_format_rejected() {
        let options = CacheOptions {
            format_timestamp: "%Y-%m-%".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(CacheError::Config { .. })
        ));
    }

    #[test]
    fn test_get_by_name() {
        let options = CacheOptions::default();
        assert_eq!(options.get("db_table"), Some(json!("cache")));
        assert_eq!(options.get("tag_enable"), Some(json!(true)));
        assert_eq!(options.get("serializer"), Some(json!("json")));
        assert_eq!(options.get("indexes").unwrap()["expiry"], json!(true));
        assert_eq!(options.get("missing"), None);
    }
}
