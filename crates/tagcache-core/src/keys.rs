//! Key and tag namespacing.

use crate::config::CacheOptions;

/// Maps caller keys and tags to their stored identifiers.
///
/// Two cache instances sharing a table stay apart as long as their prefixes differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapper {
    prefix_key: String,
    prefix_tag: String,
}

impl KeyMapper {
    pub fn new(prefix_key: impl Into<String>, prefix_tag: impl Into<String>) -> Self {
        Self {
            prefix_key: prefix_key.into(),
            prefix_tag: prefix_tag.into(),
        }
    }

    pub fn from_options(options: &CacheOptions) -> Self {
        Self::new(options.prefix_key.clone(), options.prefix_tag.clone())
    }

    /// Prefixed and sanitised cache key.
    pub fn map_key(&self, key: &str) -> String {
        Self::sanitise(format!("{}{}", self.prefix_key, key))
    }

    /// Prefixed and sanitised tag.
    pub fn map_tag(&self, tag: &str) -> String {
        Self::sanitise(format!("{}{}", self.prefix_tag, tag))
    }

    /// Character substitution hook. Keys are stored verbatim for now.
    pub fn sanitise(mapped: String) -> String {
        mapped
    }
}
