//! SQL statement definitions for the cache tables.
//!
//! Statements are rendered once per table name. Values are always bound as named
//! parameters; only the (validated) table name is interpolated.

/// Rendered statements for one cache table and its tag table.
#[derive(Debug, Clone)]
pub struct SqlDefinitions {
    table: String,
    tag_table: String,
    pub init: String,
    pub key_index: String,
    pub expiry_index: String,
    pub tag_index: String,
    pub load_key: String,
    pub load_data: String,
    pub key_tags: String,
    pub exists: String,
    pub load_tag: String,
    pub upsert: String,
    pub delete: String,
    pub delete_key_tags: String,
    pub insert_tag: String,
    pub delete_orphan_tags: String,
    pub flush: String,
    pub flush_all: String,
    pub purge: String,
    pub stats: String,
    pub distinct_tags: String,
}

impl SqlDefinitions {
    /// Suffix of the tag membership table.
    pub const TAG_TABLE_SUFFIX: &'static str = "_tags";

    /// Condition selecting live rows, relative to `:now`.
    const LIVE: &'static str = "(expires_at IS NULL OR expires_at > :now)";

    pub fn new(table: &str) -> Self {
        let t = table;
        let tags = format!("{}{}", table, Self::TAG_TABLE_SUFFIX);
        let live = Self::LIVE;

        Self {
            init: format!(
                r#"
                CREATE TABLE IF NOT EXISTS {t} (
                    key TEXT PRIMARY KEY NOT NULL,
                    data BLOB,
                    tags TEXT,
                    expires_at INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS {tags} (
                    key TEXT NOT NULL,
                    tag TEXT NOT NULL,
                    PRIMARY KEY (key, tag)
                );
                "#
            ),
            key_index: format!("CREATE UNIQUE INDEX IF NOT EXISTS {t}_key_idx ON {t}(key)"),
            expiry_index: format!("CREATE INDEX IF NOT EXISTS {t}_exp_idx ON {t}(expires_at)"),
            tag_index: format!("CREATE INDEX IF NOT EXISTS {t}_tag_idx ON {tags}(tag, key)"),
            load_key: format!(
                "SELECT key, data, tags, expires_at, created_at, updated_at
                 FROM {t} WHERE key = :key AND {live}"
            ),
            load_data: format!("SELECT data FROM {t} WHERE key = :key AND {live}"),
            key_tags: format!("SELECT tag FROM {tags} WHERE key = :key ORDER BY rowid"),
            exists: format!("SELECT 1 FROM {t} WHERE key = :key AND {live} LIMIT 1"),
            load_tag: format!(
                "SELECT c.key FROM {t} c
                 JOIN {tags} g ON g.key = c.key
                 WHERE g.tag = :tag AND (c.expires_at IS NULL OR c.expires_at > :now)
                 ORDER BY c.key"
            ),
            upsert: format!(
                r#"
                INSERT INTO {t} (key, data, tags, expires_at, created_at, updated_at)
                VALUES (:key, :data, :tags, :exp, :dated, :dated)
                ON CONFLICT(key) DO UPDATE SET
                    data = excluded.data,
                    tags = excluded.tags,
                    expires_at = excluded.expires_at,
                    updated_at = excluded.updated_at
                "#
            ),
            delete: format!("DELETE FROM {t} WHERE key = :key"),
            delete_key_tags: format!("DELETE FROM {tags} WHERE key = :key"),
            insert_tag: format!("INSERT OR IGNORE INTO {tags} (key, tag) VALUES (:key, :tag)"),
            delete_orphan_tags: format!(
                "DELETE FROM {tags} WHERE key NOT IN (SELECT key FROM {t})"
            ),
            flush: format!("DELETE FROM {t} WHERE {live}"),
            flush_all: format!("DELETE FROM {t}; DELETE FROM {tags};"),
            purge: format!("DELETE FROM {t} WHERE expires_at IS NOT NULL AND expires_at < :time"),
            stats: format!(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN {live} THEN 1 ELSE 0 END), 0),
                        COUNT(tags)
                 FROM {t}"
            ),
            distinct_tags: format!("SELECT COUNT(DISTINCT tag) FROM {tags}"),
            table: table.to_string(),
            tag_table: tags,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn tag_table(&self) -> &str {
        &self.tag_table
    }

    /// Delete every record carrying any of `count` tags bound as `:tag0..`.
    pub fn clean(&self, count: usize) -> String {
        let placeholders = Self::tag_params(count).join(", ");
        format!(
            "DELETE FROM {} WHERE key IN (SELECT key FROM {} WHERE tag IN ({}))",
            self.table, self.tag_table, placeholders
        )
    }

    /// Parameter names used by [`SqlDefinitions::clean`].
    pub fn tag_params(count: usize) -> Vec<String> {
        (0..count).map(|i| format!(":tag{}", i)).collect()
    }
}
