//! Filter store
//!
//! Owns the filter collection in memory and rewrites it in full to the
//! injected persistence backend after every mutation. When a write fails the
//! in-memory collection is rolled back so memory and storage never disagree.

pub mod persistence;

pub use persistence::{
    FilterPersistence, JsonFileStore, LoadedFilters, MemoryStore, RejectedFilter, FILTERS_KEY,
    ORPHANS_KEY,
};

use crate::filters::{normalize_label_actions, Filter, FilterDraft, FilterPatch, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Filter not found: {0}")]
    NotFound(String),

    #[error("No filter id left after {0}")]
    IdExhausted(i64),

    #[error("{0}")]
    Validation(#[from] ValidationError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Provider-side rule left behind after its local filter was deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedRule {
    pub gmail_filter_id: String,
    pub filter_name: String,
    pub recorded_at: DateTime<Utc>,
}

/// Counts shown next to the filter list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total: usize,
    pub enabled: usize,
    pub synced: usize,
    pub pending_delete: usize,
    pub orphans: usize,
}

/// In-memory filter collection backed by durable storage
pub struct FilterStore {
    persistence: Arc<dyn FilterPersistence>,
    filters: Vec<Filter>,
    orphans: Vec<OrphanedRule>,
    last_id: i64,
}

impl FilterStore {
    /// Load the collection once from `persistence`
    pub fn open(persistence: Arc<dyn FilterPersistence>) -> StoreResult<Self> {
        let LoadedFilters {
            mut filters,
            rejected,
        } = persistence.load()?;
        let orphans = persistence.load_orphans()?;

        let mut repaired = 0;
        for filter in filters.iter_mut() {
            if filter.normalize_sync_state() {
                log::warn!(
                    "Filter '{}' (ID: {}) had inconsistent sync state, repaired",
                    filter.name,
                    filter.id
                );
                repaired += 1;
            }
        }

        let last_id = filters
            .iter()
            .filter_map(|f| f.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        let mut store = Self {
            persistence,
            filters,
            orphans,
            last_id,
        };

        for record in &rejected {
            log::warn!(
                "Dropping unreadable filter record (ID: {}): {}",
                record.id.as_deref().unwrap_or("?"),
                record.reason
            );
            if let Some(gmail_filter_id) = record.gmail_filter_id.as_deref() {
                store.record_orphan(gmail_filter_id, record.name.as_deref().unwrap_or(""))?;
            }
        }

        if repaired > 0 || !rejected.is_empty() {
            store.persistence.save(&store.filters)?;
        }

        log::info!(
            "Loaded {} filters ({} orphaned remote rules)",
            store.filters.len(),
            store.orphans.len()
        );

        Ok(store)
    }

    pub fn list(&self) -> &[Filter] {
        &self.filters
    }

    pub fn get(&self, id: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.id == id)
    }

    /// Enabled filters, in list order
    pub fn active(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| f.enabled)
    }

    /// Filters whose remote deletion was interrupted
    pub fn pending_deletes(&self) -> Vec<Filter> {
        self.filters
            .iter()
            .filter(|f| f.pending_delete)
            .cloned()
            .collect()
    }

    pub fn orphans(&self) -> &[OrphanedRule] {
        &self.orphans
    }

    pub fn stats(&self) -> FilterStats {
        FilterStats {
            total: self.filters.len(),
            enabled: self.filters.iter().filter(|f| f.enabled).count(),
            synced: self.filters.iter().filter(|f| f.is_synced()).count(),
            pending_delete: self.filters.iter().filter(|f| f.pending_delete).count(),
            orphans: self.orphans.len(),
        }
    }

    /// Validate and insert a new filter, returning its id
    pub fn create(&mut self, mut draft: FilterDraft) -> StoreResult<String> {
        draft.validate()?;
        normalize_label_actions(&mut draft.actions)?;
        self.warn_duplicate_name(&draft.name, None);

        let now = Utc::now();
        let id = self.next_id(now)?;
        let filter = Filter::from_draft(id.clone(), draft, now);

        self.mutate(|filters| {
            filters.push(filter);
            Ok(())
        })?;

        log::info!("Created filter ID: {}", id);
        Ok(id)
    }

    /// Apply a partial update; the merged filter must still pass validation
    pub fn update(&mut self, id: &str, patch: FilterPatch) -> StoreResult<()> {
        if let Some(name) = patch.name.as_deref() {
            self.warn_duplicate_name(name, Some(id));
        }

        self.mutate(|filters| {
            let filter = find_mut(filters, id)?;
            filter.apply_patch(patch);
            filter.validate()?;
            normalize_label_actions(&mut filter.actions)?;
            filter.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Flip `enabled`, returning the new value. Sync state is untouched.
    pub fn toggle_enabled(&mut self, id: &str) -> StoreResult<bool> {
        self.mutate(|filters| {
            let filter = find_mut(filters, id)?;
            filter.enabled = !filter.enabled;
            filter.updated_at = Utc::now();
            Ok(filter.enabled)
        })
    }

    /// Remove a filter from the collection, returning the removed record
    pub fn remove(&mut self, id: &str) -> StoreResult<Filter> {
        let removed = self.mutate(|filters| {
            let index = filters
                .iter()
                .position(|f| f.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            Ok(filters.remove(index))
        })?;

        log::info!("Deleted filter '{}' (ID: {})", removed.name, removed.id);
        Ok(removed)
    }

    pub(crate) fn mark_synced(&mut self, id: &str, gmail_filter_id: String) -> StoreResult<()> {
        self.mutate(|filters| {
            let filter = find_mut(filters, id)?;
            filter.mark_synced(gmail_filter_id);
            filter.updated_at = Utc::now();
            Ok(())
        })
    }

    pub(crate) fn set_pending_delete(&mut self, id: &str, pending: bool) -> StoreResult<()> {
        self.mutate(|filters| {
            find_mut(filters, id)?.pending_delete = pending;
            Ok(())
        })
    }

    pub(crate) fn record_orphan(
        &mut self,
        gmail_filter_id: &str,
        filter_name: &str,
    ) -> StoreResult<()> {
        if self.orphans.iter().any(|o| o.gmail_filter_id == gmail_filter_id) {
            return Ok(());
        }

        self.orphans.push(OrphanedRule {
            gmail_filter_id: gmail_filter_id.to_string(),
            filter_name: filter_name.to_string(),
            recorded_at: Utc::now(),
        });

        if let Err(e) = self.persistence.save_orphans(&self.orphans) {
            self.orphans.pop();
            return Err(e);
        }

        log::warn!(
            "Remote rule {} from filter '{}' is orphaned",
            gmail_filter_id,
            filter_name
        );
        Ok(())
    }

    pub(crate) fn clear_orphan(&mut self, gmail_filter_id: &str) -> StoreResult<()> {
        let before = self.orphans.clone();
        self.orphans.retain(|o| o.gmail_filter_id != gmail_filter_id);
        if let Err(e) = self.persistence.save_orphans(&self.orphans) {
            self.orphans = before;
            return Err(e);
        }
        Ok(())
    }

    /// Run `change` on a copy of the collection and keep it only if it persists
    fn mutate<T>(
        &mut self,
        change: impl FnOnce(&mut Vec<Filter>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut next = self.filters.clone();
        let out = change(&mut next)?;

        if let Err(e) = self.persistence.save(&next) {
            log::error!("Failed to persist filters: {}", e);
            return Err(e);
        }

        self.filters = next;
        Ok(out)
    }

    /// Millisecond timestamp, bumped so ids stay strictly increasing
    fn next_id(&mut self, now: DateTime<Utc>) -> StoreResult<String> {
        let bumped = self
            .last_id
            .checked_add(1)
            .ok_or(StoreError::IdExhausted(self.last_id))?;
        self.last_id = now.timestamp_millis().max(bumped);
        Ok(self.last_id.to_string())
    }

    fn warn_duplicate_name(&self, name: &str, except_id: Option<&str>) {
        let duplicate = self
            .filters
            .iter()
            .any(|f| f.name == name && Some(f.id.as_str()) != except_id);
        if duplicate {
            log::warn!("Another filter is already named '{}'", name);
        }
    }
}

fn find_mut<'a>(filters: &'a mut [Filter], id: &str) -> StoreResult<&'a mut Filter> {
    filters
        .iter_mut()
        .find(|f| f.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}
