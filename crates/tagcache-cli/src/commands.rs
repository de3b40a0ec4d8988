//! Command dispatch for the tagcache CLI.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::time::Duration;
use tagcache_core::{CacheAdapter, SqliteCache};
use tracing::debug;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value stored under a key
    Get { key: String },

    /// Store a value (parsed as JSON, or taken as a string)
    Set {
        key: String,
        value: String,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Time to live in seconds (0 = never expires)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Delete { key: String },

    /// List the keys carrying a tag
    Tag { tag: String },

    /// Delete every entry carrying any of the tags
    Clean {
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Delete live entries (or every entry with --all)
    Flush {
        #[arg(long)]
        all: bool,
    },

    /// Reap expired entries
    Purge {
        /// Also reap entries expiring within this many seconds
        #[arg(long, default_value = "0")]
        extra: u64,
    },

    /// Create the configured secondary indexes
    Indexes,

    /// Print row counts
    Stats,
}

/// Run one command and return what should be printed.
pub fn execute(cache: &SqliteCache, command: &Command) -> Result<String> {
    debug!("Executing {:?}", command);

    match command {
        Command::Get { key } => get(cache, key),
        Command::Set {
            key,
            value,
            tags,
            ttl,
        } => {
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            let ttl = ttl.map(Duration::from_secs);
            let saved = match cache.serializer() {
                Some(_) => cache.save(&parse_value(value), key, &tags, ttl)?,
                None => cache.save_raw(Some(value.as_bytes()), key, &tags, ttl)?,
            };
            Ok(status(saved, "stored", "not stored"))
        }
        Command::Delete { key } => Ok(status(cache.delete(key)?, "deleted", "not found")),
        Command::Tag { tag } => Ok(cache
            .load_tag(tag)?
            .map(|keys| keys.join("\n"))
            .unwrap_or_else(|| "(none)".to_string())),
        Command::Clean { tags } => {
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            Ok(status(cache.clean(&tags)?, "cleaned", "nothing to clean"))
        }
        Command::Flush { all } => Ok(status(cache.flush(*all)?, "flushed", "nothing to flush")),
        Command::Purge { extra } => {
            cache.purge(Duration::from_secs(*extra))?;
            Ok("purged".to_string())
        }
        Command::Indexes => {
            cache.create_indexes()?;
            Ok("indexes ready".to_string())
        }
        Command::Stats => {
            let stats = cache.stats()?;
            serde_json::to_string_pretty(&stats).context("Failed to format stats")
        }
    }
}

fn get(cache: &SqliteCache, key: &str) -> Result<String> {
    let output = match cache.serializer() {
        Some(_) => cache
            .load_key::<serde_json::Value>(key)?
            .map(|value| serde_json::to_string_pretty(&value))
            .transpose()
            .context("Failed to format value")?,
        None => cache
            .load_raw(key)?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()),
    };

    Ok(output.unwrap_or_else(|| "(nil)".to_string()))
}

/// JSON if it parses, otherwise the literal string.
fn parse_value(value: &str) -> serde_json::Value {
    serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}

fn status(ok: bool, yes: &str, no: &str) -> String {
    if ok { yes } else { no }.to_string()
}
