//! Durable key-value backends for the filter collection
//!
//! The whole collection lives under one key and is rewritten on every
//! mutation. Last write wins; there is no cross-process coordination.

use super::{OrphanedRule, StoreError, StoreResult};
use crate::filters::Filter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Key holding the JSON array of all filters
pub const FILTERS_KEY: &str = "smartFilters";

/// Key holding remote rules whose local record is gone
pub const ORPHANS_KEY: &str = "smartFiltersOrphans";

/// Filter collection as read back from storage
#[derive(Debug, Default)]
pub struct LoadedFilters {
    pub filters: Vec<Filter>,
    /// Records that no longer decode; they are dropped on the next write
    pub rejected: Vec<RejectedFilter>,
}

/// Stored record that could not be read as a [`Filter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub gmail_filter_id: Option<String>,
    pub reason: String,
}

impl RejectedFilter {
    fn from_record(record: &Value, reason: String) -> Self {
        let text = |key: &str| match record.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Self {
            id: text("id"),
            name: text("name"),
            gmail_filter_id: text("gmailFilterId"),
            reason,
        }
    }
}

/// Storage backend injected into [`super::FilterStore`]
pub trait FilterPersistence: Send + Sync {
    /// Read the full collection; a missing key is an empty collection.
    ///
    /// One unreadable record never hides the others.
    fn load(&self) -> StoreResult<LoadedFilters>;

    /// Replace the full collection
    fn save(&self, filters: &[Filter]) -> StoreResult<()>;

    fn load_orphans(&self) -> StoreResult<Vec<OrphanedRule>> {
        Ok(Vec::new())
    }

    fn save_orphans(&self, _orphans: &[OrphanedRule]) -> StoreResult<()> {
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: Option<String>) -> StoreResult<Vec<T>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", key, e))),
    }
}

/// Decode an array key record by record, returning the records that failed
fn decode_records<T: DeserializeOwned>(
    key: &str,
    raw: Option<String>,
) -> StoreResult<(Vec<T>, Vec<(Value, String)>)> {
    let records: Vec<Value> = decode(key, raw)?;
    let mut items = Vec::with_capacity(records.len());
    let mut failed = Vec::new();

    for record in records {
        match serde_json::from_value::<T>(record.clone()) {
            Ok(item) => items.push(item),
            Err(e) => {
                log::warn!("Skipping unreadable {} record: {}", key, e);
                failed.push((record, e.to_string()));
            }
        }
    }

    Ok((items, failed))
}

fn decode_filters(raw: Option<String>) -> StoreResult<LoadedFilters> {
    let (filters, failed) = decode_records(FILTERS_KEY, raw)?;
    let rejected = failed
        .iter()
        .map(|(record, reason)| RejectedFilter::from_record(record, reason.clone()))
        .collect();
    Ok(LoadedFilters { filters, rejected })
}

fn decode_orphans(raw: Option<String>) -> StoreResult<Vec<OrphanedRule>> {
    decode_records(ORPHANS_KEY, raw).map(|(orphans, _)| orphans)
}

fn encode<T: Serialize>(key: &str, items: &[T]) -> StoreResult<String> {
    serde_json::to_string(items).map_err(|e| StoreError::Serialization(format!("{}: {}", key, e)))
}

// ============================================================================
// JSON files
// ============================================================================

/// One `<key>.json` file per key inside a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the data directory
    pub fn new(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        log::debug!("Filter storage directory: {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read_key(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Write through a temp file so a crash never leaves a truncated collection
    fn write_key(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.key_path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl FilterPersistence for JsonFileStore {
    fn load(&self) -> StoreResult<LoadedFilters> {
        decode_filters(self.read_key(FILTERS_KEY)?)
    }

    fn save(&self, filters: &[Filter]) -> StoreResult<()> {
        self.write_key(FILTERS_KEY, &encode(FILTERS_KEY, filters)?)
    }

    fn load_orphans(&self) -> StoreResult<Vec<OrphanedRule>> {
        decode_orphans(self.read_key(ORPHANS_KEY)?)
    }

    fn save_orphans(&self, orphans: &[OrphanedRule]) -> StoreResult<()> {
        self.write_key(ORPHANS_KEY, &encode(ORPHANS_KEY, orphans)?)
    }
}

// ============================================================================
// In memory
// ============================================================================

/// Process-local backend; still round-trips through JSON like the file store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON stored under `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Overwrite `key` with raw text, bypassing encoding
    #[cfg(test)]
    pub(crate) fn save_raw(&self, key: &str, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    #[cfg(test)]
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write_key(&self, key: &str, value: String) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "storage is read-only",
            )));
        }
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}

impl FilterPersistence for MemoryStore {
    fn load(&self) -> StoreResult<LoadedFilters> {
        decode_filters(self.raw(FILTERS_KEY))
    }

    fn save(&self, filters: &[Filter]) -> StoreResult<()> {
        self.write_key(FILTERS_KEY, encode(FILTERS_KEY, filters)?)
    }

    fn load_orphans(&self) -> StoreResult<Vec<OrphanedRule>> {
        decode_orphans(self.raw(ORPHANS_KEY))
    }

    fn save_orphans(&self, orphans: &[OrphanedRule]) -> StoreResult<()> {
        self.write_key(ORPHANS_KEY, encode(ORPHANS_KEY, orphans)?)
    }
}
