//! Per-filter operation state
//!
//! A filter runs at most one remote operation at a time. `begin` refuses a
//! second one instead of queueing it, and the returned guard puts the filter
//! back to `Idle` when it goes out of scope, on success and failure alike.

use super::coordinator::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Remote operation currently running for a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperation {
    Idle,
    Syncing,
    Testing,
    Applying,
    Deleting,
}

impl FilterOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperation::Idle => "idle",
            FilterOperation::Syncing => "syncing",
            FilterOperation::Testing => "testing",
            FilterOperation::Applying => "applying",
            FilterOperation::Deleting => "deleting",
        }
    }
}

impl fmt::Display for FilterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks which filters have an operation in flight
#[derive(Debug, Default)]
pub struct OperationTracker {
    running: Mutex<HashMap<String, FilterOperation>>,
}

impl OperationTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self, filter_id: &str) -> FilterOperation {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(filter_id)
            .copied()
            .unwrap_or(FilterOperation::Idle)
    }

    /// Move `filter_id` from `Idle` to `operation`
    pub fn begin(
        self: &Arc<Self>,
        filter_id: &str,
        operation: FilterOperation,
    ) -> SyncResult<OperationGuard> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(current) = running.get(filter_id) {
            return Err(SyncError::Busy {
                filter_id: filter_id.to_string(),
                operation: *current,
            });
        }

        running.insert(filter_id.to_string(), operation);
        log::debug!("Filter ID: {} -> {}", filter_id, operation);

        Ok(OperationGuard {
            tracker: Arc::clone(self),
            filter_id: filter_id.to_string(),
        })
    }

    fn finish(&self, filter_id: &str) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(filter_id);
        log::debug!("Filter ID: {} -> idle", filter_id);
    }
}

/// Returns its filter to `Idle` on drop
#[must_use = "the filter returns to idle as soon as the guard is dropped"]
pub struct OperationGuard {
    tracker: Arc<OperationTracker>,
    filter_id: String,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.filter_id);
    }
}
