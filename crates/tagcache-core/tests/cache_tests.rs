//! Integration tests for the tagged cache public interface.
//!
//! These exercise the behaviors callers rely on: upsert, expiry, tag indexing,
//! flush/purge policies and serializer round-trips.

use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagcache_core::{
    CacheAdapter, CacheError, CacheOptions, LoadKind, Loaded, SerializerKind, SqliteCache,
};
use tempfile::TempDir;

fn create_test_cache() -> (TempDir, SqliteCache) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("cache/tagcache.sqlite");
    let cache = SqliteCache::open(&db_path, CacheOptions::default()).unwrap();
    cache.create_indexes().unwrap();
    (temp_dir, cache)
}

fn row_count(cache: &SqliteCache) -> i64 {
    let conn = cache.adapter().lock().unwrap();
    conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))
        .unwrap()
}

fn expired() -> Option<chrono::DateTime<chrono::Utc>> {
    Some(chrono::Utc::now() - chrono::Duration::seconds(5))
}

#[test]
fn test_upsert_keeps_single_record() {
    let (_temp, cache) = create_test_cache();

    assert!(cache.save("first", "k", &[], None).unwrap());
    assert!(cache.save("second", "k", &[], None).unwrap());

    assert_eq!(row_count(&cache), 1);
    assert_eq!(
        cache.load_key::<String>("k").unwrap().as_deref(),
        Some("second")
    );
}

#[test]
fn test_ttl_expiry_hides_record_until_purge() {
    let (_temp, cache) = create_test_cache();

    cache
        .save("short lived", "ttl", &[], Some(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(
        cache.load_key::<String>("ttl").unwrap().as_deref(),
        Some("short lived")
    );

    std::thread::sleep(Duration::from_millis(1_200));

    assert_eq!(cache.load_key::<String>("ttl").unwrap(), None);
    assert!(!cache.contains("ttl").unwrap());
    // Still physically stored until purged.
    assert_eq!(row_count(&cache), 1);

    assert!(cache.purge(Duration::ZERO).unwrap());
    assert_eq!(row_count(&cache), 0);
}

#[test]
fn test_missing_or_zero_ttl_never_expires() {
    let (_temp, cache) = create_test_cache();

    cache.save(&1, "none", &[], None).unwrap();
    cache.save(&2, "zero", &[], Some(Duration::ZERO)).unwrap();

    for key in ["none", "zero"] {
        let record = cache.load_record(key).unwrap().unwrap();
        assert!(record.expires_at.is_none());
    }

    cache.purge(Duration::from_secs(365 * 24 * 3600)).unwrap();
    assert_eq!(cache.load_key::<i32>("none").unwrap(), Some(1));
    assert_eq!(cache.load_key::<i32>("zero").unwrap(), Some(2));
}

#[test]
fn test_tag_round_trip() {
    let (_temp, cache) = create_test_cache();

    cache.save("a", "A", &["x"], None).unwrap();
    cache.save("b", "B", &["x", "y"], None).unwrap();
    cache.save("c", "C", &["y"], None).unwrap();

    let mapper = cache.mapper();
    let (a, b, c) = (mapper.map_key("A"), mapper.map_key("B"), mapper.map_key("C"));

    assert_eq!(cache.load_tag("x").unwrap(), Some(vec![a, b.clone()]));
    assert_eq!(cache.load_tag("y").unwrap(), Some(vec![b, c.clone()]));

    assert!(cache.clean(&["x"]).unwrap());
    assert!(!cache.contains("A").unwrap());
    assert!(!cache.contains("B").unwrap());
    assert_eq!(cache.load_key::<String>("C").unwrap().as_deref(), Some("c"));
    assert_eq!(cache.load_tag("x").unwrap(), None);
    assert_eq!(cache.load_tag("y").unwrap(), Some(vec![c]));

    assert!(!cache.clean(&["x"]).unwrap());
}

#[test]
fn test_clean_matches_any_tag() {
    let (_temp, cache) = create_test_cache();

    cache.save(&1, "one", &["red"], None).unwrap();
    cache.save(&2, "two", &["green"], None).unwrap();
    cache.save(&3, "three", &["blue"], None).unwrap();

    assert!(cache.clean(&["red", "blue", "unused"]).unwrap());
    assert!(!cache.contains("one").unwrap());
    assert!(cache.contains("two").unwrap());
    assert!(!cache.contains("three").unwrap());
}

#[test]
fn test_tags_match_exactly() {
    let (_temp, cache) = create_test_cache();

    cache.save("v", "k", &["abc"], None).unwrap();

    assert_eq!(cache.load_tag("ab").unwrap(), None);
    assert!(!cache.clean(&["ab", "bc"]).unwrap());
    assert!(cache.contains("k").unwrap());
    assert!(cache.load_tag("abc").unwrap().is_some());
}

#[test]
fn test_resave_replaces_tags() {
    let (_temp, cache) = create_test_cache();

    cache.save("v1", "k", &["old"], None).unwrap();
    cache.save("v2", "k", &["new"], None).unwrap();

    assert_eq!(cache.load_tag("old").unwrap(), None);
    assert!(cache.load_tag("new").unwrap().is_some());

    cache.save("v3", "k", &[], None).unwrap();
    assert_eq!(cache.load_tag("new").unwrap(), None);
    assert_eq!(cache.stats().unwrap().distinct_tags, 0);
}

#[test]
fn test_flush_leaves_expired_rows_for_purge() {
    let (_temp, cache) = create_test_cache();

    cache.save("live", "live", &["t"], None).unwrap();
    cache
        .save_with_expiry(Some(b"\"stale\"".as_slice()), "stale", &["t"], expired())
        .unwrap();

    assert!(cache.flush(false).unwrap());
    assert!(!cache.contains("live").unwrap());

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.expired_entries, 1);

    // Nothing live left to flush.
    assert!(!cache.flush(false).unwrap());

    assert!(cache.flush(true).unwrap());
    assert_eq!(row_count(&cache), 0);
    assert_eq!(cache.stats().unwrap().distinct_tags, 0);
}

#[test]
fn test_flush_all_on_empty_table_succeeds() {
    let (_temp, cache) = create_test_cache();
    assert!(cache.flush(true).unwrap());
    assert!(!cache.flush(false).unwrap());
}

#[test]
fn test_delete() {
    let (_temp, cache) = create_test_cache();

    cache.save("v", "k", &["t"], None).unwrap();
    assert!(cache.delete("k").unwrap());
    assert!(!cache.delete("k").unwrap());
    assert!(!cache.delete("never-saved").unwrap());
    assert_eq!(cache.load_tag("t").unwrap(), None);
}

#[test]
fn test_load_dispatch() {
    let (_temp, cache) = create_test_cache();

    cache.save(&42, "answer", &["numbers"], None).unwrap();

    assert_eq!(
        cache.load::<i32>("answer", LoadKind::Key).unwrap(),
        Some(Loaded::Value(42))
    );
    assert_eq!(
        cache.load::<i32>("numbers", LoadKind::Tag).unwrap(),
        Some(Loaded::Keys(vec![cache.mapper().map_key("answer")]))
    );
    assert_eq!(cache.load::<i32>("missing", LoadKind::Key).unwrap(), None);
}

#[test]
fn test_serializers_round_trip_value_shapes() {
    for kind in [SerializerKind::Json, SerializerKind::Gzip, SerializerKind::Zstd] {
        let options = CacheOptions {
            serializer: kind,
            ..Default::default()
        };
        let cache = SqliteCache::open_in_memory(options).unwrap();

        let mut nested = BTreeMap::new();
        nested.insert("outer".to_string(), BTreeMap::from([("inner".to_string(), vec![1, 2])]));

        cache.save("text", "s", &[], None).unwrap();
        cache.save(&-7i64, "i", &[], None).unwrap();
        cache.save(&nested, "m", &[], None).unwrap();
        cache.save(&vec!["a", "b"], "v", &[], None).unwrap();

        assert_eq!(cache.load_key::<String>("s").unwrap().as_deref(), Some("text"));
        assert_eq!(cache.load_key::<i64>("i").unwrap(), Some(-7));
        assert_eq!(
            cache
                .load_key::<BTreeMap<String, BTreeMap<String, Vec<i32>>>>("m")
                .unwrap(),
            Some(nested)
        );
        assert_eq!(
            cache.load_key::<Vec<String>>("v").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}

#[test]
fn test_wrong_type_is_serialization_error() {
    let (_temp, cache) = create_test_cache();
    cache.save("not a number", "k", &[], None).unwrap();

    let err = cache.load_key::<i64>("k").unwrap_err();
    assert!(matches!(err, CacheError::Serialization { .. }));
}

#[test]
fn test_prefixes_isolate_instances_on_shared_connection() {
    let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));

    let first = SqliteCache::new(
        Arc::clone(&conn),
        CacheOptions {
            prefix_key: "first:".to_string(),
            prefix_tag: "first-tag:".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let second = SqliteCache::new(
        Arc::clone(&conn),
        CacheOptions {
            prefix_key: "second:".to_string(),
            prefix_tag: "second-tag:".to_string(),
            ..Default::default()
        },
    )
    .unwrap();

    first.save("one", "k", &["shared"], None).unwrap();
    second.save("two", "k", &["shared"], None).unwrap();

    assert_eq!(first.load_key::<String>("k").unwrap().as_deref(), Some("one"));
    assert_eq!(second.load_key::<String>("k").unwrap().as_deref(), Some("two"));

    assert!(first.clean(&["shared"]).unwrap());
    assert!(!first.contains("k").unwrap());
    assert!(second.contains("k").unwrap());

    // The cache never closes the caller's connection.
    drop(first);
    drop(second);
    let count: i64 = conn
        .lock()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_reopen_persists_records() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("persist.sqlite");

    {
        let cache = SqliteCache::open(&db_path, CacheOptions::default()).unwrap();
        cache.save("kept", "k", &["t"], None).unwrap();
    }

    let cache = SqliteCache::open(&db_path, CacheOptions::default()).unwrap();
    assert_eq!(cache.load_key::<String>("k").unwrap().as_deref(), Some("kept"));
    assert!(cache.load_tag("t").unwrap().is_some());
}

#[test]
fn test_invalid_options_fail_at_construction() {
    let result = SqliteCache::open_in_memory(CacheOptions {
        db_table: "bad table".to_string(),
        ..Default::default()
    });
    assert!(matches!(result, Err(CacheError::Config { .. })));
}
