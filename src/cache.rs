//! Namespaced, best-effort persistence for fetched payloads.
//!
//! A [`CacheStore`] maps a string key to a timestamped [`CacheRecord`].  It
//! knows nothing about freshness (that lives in [`crate::freshness`]) and it
//! never reports an error: a missing directory, an unreadable file, or a
//! malformed record all read back as "absent".
//!
//! ## On-disk layout
//!
//! Each key is one JSON document:
//!
//! ```text
//! weather-cache-london.json   {"updatedAt": 1760000000000, "data":  {...}}
//! news-cache.json             {"updatedAt": 1760000000000, "items": [...]}
//! ```
//!
//! The payload property name comes from [`Cacheable::FIELD`].

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Cache key used by the single, global headline source.
pub const NEWS_CACHE_KEY: &str = "news-cache";

/// Cache key for a weather source (`"local"` or a city id).
pub fn weather_cache_key(id: &str) -> String {
    format!("weather-cache-{id}")
}

/// Raw string storage underneath the cache.
///
/// Implementations swallow their own failures: callers only ever see a
/// value or `None`.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
}

/// A payload type that can be written to the cache.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// JSON property holding the payload, next to `updatedAt`.
    const FIELD: &'static str;
}

/// The last successfully fetched payload for a source, with its write time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord<T> {
    pub updated_at: DateTime<Utc>,
    pub payload: T,
}

/// Typed, last-write-wins view over a [`Storage`] backend.
#[derive(Clone)]
pub struct CacheStore {
    storage: Arc<dyn Storage>,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// A store backed by process memory only.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    /// Read the record stored under `key`.
    ///
    /// Corrupted or foreign-shaped documents are treated as a miss.
    pub fn get<T: Cacheable>(&self, key: &str) -> Option<CacheRecord<T>> {
        let Some(raw) = self.storage.get_item(key) else {
            tracing::debug!(key, "cache miss");
            return None;
        };

        match decode(&raw) {
            Some(record) => {
                tracing::debug!(key, updated_at = %record.updated_at, "cache hit");
                Some(record)
            }
            None => {
                tracing::warn!(key, "discarding malformed cache record");
                None
            }
        }
    }

    /// Replace the record under `key`, stamped with the current time.
    pub fn put<T: Cacheable>(&self, key: &str, payload: &T) {
        self.put_at(key, payload, Utc::now());
    }

    /// Replace the record under `key` with an explicit timestamp.
    pub fn put_at<T: Cacheable>(&self, key: &str, payload: &T, updated_at: DateTime<Utc>) {
        match encode(payload, updated_at) {
            Ok(raw) => self.storage.set_item(key, &raw),
            Err(e) => tracing::warn!(key, error = %e, "failed to encode cache record"),
        }
    }
}

fn decode<T: Cacheable>(raw: &str) -> Option<CacheRecord<T>> {
    let mut object: Map<String, Value> = serde_json::from_str(raw).ok()?;
    let millis = object.get("updatedAt")?.as_i64()?;
    let updated_at = DateTime::from_timestamp_millis(millis)?;
    let payload = serde_json::from_value(object.remove(T::FIELD)?).ok()?;
    Some(CacheRecord {
        updated_at,
        payload,
    })
}

fn encode<T: Cacheable>(payload: &T, updated_at: DateTime<Utc>) -> serde_json::Result<String> {
    let mut object = Map::new();
    let millis = Value::from(updated_at.timestamp_millis());
    object.insert("updatedAt".into(), millis);
    object.insert(T::FIELD.into(), serde_json::to_value(payload)?);
    serde_json::to_string(&Value::Object(object))
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// One JSON file per key inside a cache directory.
///
/// Writes go to a temporary sibling first and are then renamed over the
/// target, so a reader never observes a half-written record.
pub struct FileStorage {
    /// `None` when the directory could not be created; every read then misses.
    dir: Option<PathBuf>,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir) {
            Ok(()) => Self { dir: Some(dir) },
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "cache directory unavailable; caching disabled"
                );
                Self { dir: None }
            }
        }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", file_stem(key))))
    }
}

/// Map a cache key onto a safe file name.
///
/// Keys built from validated city ids pass through unchanged, so distinct
/// sources never share a file.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read cache file");
                None
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) {
        let Some(path) = self.path_for(key) else {
            return;
        };
        let tmp = path.with_extension("json.tmp");
        let result = fs::write(&tmp, value).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to write cache file");
            let _ = fs::remove_file(&tmp);
        }
    }
}

/// Process-local storage for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    items: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
