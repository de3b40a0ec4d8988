//! Payload encoders.
//!
//! The set of encoders is closed: a [`SerializerKind`] is parsed from configuration
//! and turned into a [`Serializer`] once, when the cache is built. `none` disables
//! encoding and the cache stores caller-supplied bytes as-is.

use crate::error::{CacheError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

/// Configured encoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    /// Store raw bytes, no encoding.
    None,
    /// Compact JSON text.
    #[default]
    Json,
    /// JSON compressed with gzip.
    Gzip,
    /// JSON compressed with zstd.
    Zstd,
}

impl SerializerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::None => "none",
            SerializerKind::Json => "json",
            SerializerKind::Gzip => "gzip",
            SerializerKind::Zstd => "zstd",
        }
    }
}

impl FromStr for SerializerKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(SerializerKind::None),
            "json" => Ok(SerializerKind::Json),
            "gzip" => Ok(SerializerKind::Gzip),
            "zstd" => Ok(SerializerKind::Zstd),
            other => Err(CacheError::config(format!(
                "Unknown serializer '{}' (expected none, json, gzip or zstd)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An active payload encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializer {
    Json,
    Gzip,
    Zstd,
}

impl Serializer {
    /// zstd level used for the fast binary form.
    pub const ZSTD_LEVEL: i32 = 1;

    /// Select the encoder for a configured kind. `None` yields no encoder.
    pub fn from_kind(kind: SerializerKind) -> Option<Self> {
        match kind {
            SerializerKind::None => None,
            SerializerKind::Json => Some(Serializer::Json),
            SerializerKind::Gzip => Some(Serializer::Gzip),
            SerializerKind::Zstd => Some(Serializer::Zstd),
        }
    }

    pub fn kind(&self) -> SerializerKind {
        match self {
            Serializer::Json => SerializerKind::Json,
            Serializer::Gzip => SerializerKind::Gzip,
            Serializer::Zstd => SerializerKind::Zstd,
        }
    }

    /// Encode a value into its stored form.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value)?;
        match self {
            Serializer::Json => Ok(json),
            Serializer::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
                encoder
                    .write_all(&json)
                    .map_err(compression_error("gzip"))?;
                encoder.finish().map_err(compression_error("gzip"))
            }
            Serializer::Zstd => zstd::encode_all(json.as_slice(), Self::ZSTD_LEVEL)
                .map_err(compression_error("zstd")),
        }
    }

    /// Decode a stored payload back into a value.
    pub fn deserialize<T: DeserializeOwned>(&self, stored: &[u8]) -> Result<T> {
        let json = match self {
            Serializer::Json => return Ok(serde_json::from_slice(stored)?),
            Serializer::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(stored)
                    .read_to_end(&mut out)
                    .map_err(compression_error("gunzip"))?;
                out
            }
            Serializer::Zstd => zstd::decode_all(stored).map_err(compression_error("unzstd"))?,
        };

        Ok(serde_json::from_slice(&json)?)
    }
}

fn compression_error(action: &'static str) -> impl FnOnce(std::io::Error) -> CacheError {
    move |e| CacheError::Compression {
        message: format!("Failed to {} payload: {}", action, e),
        source: Some(e),
    }
}
