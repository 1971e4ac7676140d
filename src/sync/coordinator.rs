//! Sync Coordinator - moves filters between local Draft and Gmail-synced
//!
//! Draft -> Syncing -> Synced, or back to Draft when the create call fails.
//! Deletion of a synced filter is two-phase: the record is marked
//! pending-delete and persisted, the remote rule is deleted, then the local
//! record goes. A failed remote delete leaves an entry in the orphan ledger.

use super::api::{FilterApi, FilterApiError};
use super::state::{FilterOperation, OperationTracker};
use crate::filters::{validate_label_actions, ValidationError};
use crate::store::{FilterStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

const REAUTH_PROMPT: &str =
    "Gmail needs additional permissions to manage filters. Re-authenticate now?";

/// Prompt shown when the backend reports missing Gmail permissions
pub trait ReauthHandler: Send + Sync {
    /// Ask the user whether to re-authenticate
    fn confirm(&self, message: &str) -> bool;

    /// Send the user to the provider's consent screen
    fn redirect(&self, url: &str);
}

/// Handler for headless use: declines and logs
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineReauth;

impl ReauthHandler for DeclineReauth {
    fn confirm(&self, message: &str) -> bool {
        log::warn!("Re-authentication required: {}", message);
        false
    }

    fn redirect(&self, _url: &str) {}
}

/// Shared prompt plumbing for every remote operation
#[derive(Clone)]
pub(crate) struct Reauth {
    handler: Arc<dyn ReauthHandler>,
    url: String,
}

impl Reauth {
    pub(crate) fn new(handler: Arc<dyn ReauthHandler>, url: String) -> Self {
        Self { handler, url }
    }

    /// Map an API failure to the user-facing error, prompting on `needsReauth`
    pub(crate) fn handle(&self, err: FilterApiError, fallback: &str) -> SyncError {
        match err {
            FilterApiError::NeedsReauth { .. } => {
                let redirected = self.handler.confirm(REAUTH_PROMPT);
                if redirected {
                    log::info!("Redirecting to re-authentication");
                    self.handler.redirect(&self.url);
                }
                SyncError::NeedsReauth { redirected }
            }
            other => {
                log::warn!("{}: {}", fallback, other);
                let message = match (other.server_message(), &other) {
                    (Some(text), _) => format!("{}: {}", fallback, text),
                    (None, FilterApiError::Request(e)) => format!("{}: {}", fallback, e),
                    (None, _) => fallback.to_string(),
                };
                SyncError::Remote(message)
            }
        }
    }
}

/// What happened to the remote rule when a filter was deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DeleteOutcome {
    /// Local record gone and no remote rule left behind
    Deleted,
    /// Local record gone but the Gmail rule could not be removed
    Orphaned { gmail_filter_id: String },
}

/// Drives the Draft/Synced lifecycle of stored filters
#[derive(Clone)]
pub struct SyncCoordinator {
    api: Arc<dyn FilterApi>,
    store: Arc<Mutex<FilterStore>>,
    tracker: Arc<OperationTracker>,
    reauth: Reauth,
}

impl SyncCoordinator {
    pub(crate) fn new(
        api: Arc<dyn FilterApi>,
        store: Arc<Mutex<FilterStore>>,
        tracker: Arc<OperationTracker>,
        reauth: Reauth,
    ) -> Self {
        Self {
            api,
            store,
            tracker,
            reauth,
        }
    }

    fn store(&self) -> MutexGuard<'_, FilterStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the Gmail-side rule for a Draft filter, returning its Gmail id
    pub async fn sync_to_gmail(&self, filter_id: &str) -> SyncResult<String> {
        let filter = self
            .store()
            .get(filter_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(filter_id.to_string()))?;

        if filter.is_synced() {
            return Err(SyncError::AlreadySynced(filter_id.to_string()));
        }

        let _guard = self.tracker.begin(filter_id, FilterOperation::Syncing)?;

        validate_label_actions(&filter.actions)?;

        log::info!("Syncing filter '{}' (ID: {}) to Gmail", filter.name, filter.id);

        let gmail_filter_id = self
            .api
            .create_filter(&filter)
            .await
            .map_err(|e| self.reauth.handle(e, "Failed to sync filter to Gmail"))?;

        let saved = self.store().mark_synced(filter_id, gmail_filter_id.clone());
        if let Err(e) = saved {
            log::error!(
                "Gmail filter {} created but local state could not be saved: {}",
                gmail_filter_id,
                e
            );
            self.discard_remote(&gmail_filter_id, &filter.name).await;
            return Err(SyncError::Store(e));
        }

        log::info!(
            "Filter '{}' (ID: {}) synced to Gmail as {}",
            filter.name,
            filter.id,
            gmail_filter_id
        );
        Ok(gmail_filter_id)
    }

    /// Delete a filter locally, removing its Gmail rule first when synced.
    ///
    /// The local record is removed even when the remote delete fails; the
    /// remote id is then kept in the orphan ledger.
    pub async fn delete_filter(&self, filter_id: &str) -> SyncResult<DeleteOutcome> {
        let filter = self
            .store()
            .get(filter_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(filter_id.to_string()))?;

        let _guard = self.tracker.begin(filter_id, FilterOperation::Deleting)?;

        let gmail_filter_id = match filter.gmail_filter_id() {
            Some(id) if filter.is_synced() => id.to_string(),
            _ => {
                self.store().remove(filter_id)?;
                return Ok(DeleteOutcome::Deleted);
            }
        };

        if !filter.is_pending_delete() {
            self.store().set_pending_delete(filter_id, true)?;
        }

        let remote = self.api.delete_filter(&gmail_filter_id).await;

        let outcome = match remote {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.status() == Some(404) => {
                log::info!("Gmail filter {} was already gone", gmail_filter_id);
                DeleteOutcome::Deleted
            }
            Err(e) => {
                log::warn!(
                    "Failed to delete Gmail filter {} for '{}': {}",
                    gmail_filter_id,
                    filter.name,
                    e
                );
                DeleteOutcome::Orphaned { gmail_filter_id }
            }
        };

        let mut store = self.store();
        store.remove(filter_id)?;
        if let DeleteOutcome::Orphaned { gmail_filter_id } = &outcome {
            if let Err(e) = store.record_orphan(gmail_filter_id, &filter.name) {
                log::error!("Failed to record orphaned Gmail filter {}: {}", gmail_filter_id, e);
            }
        }

        Ok(outcome)
    }

    /// Finish deletions interrupted before the remote call returned
    pub async fn resume_pending_deletes(&self) -> Vec<DeleteOutcome> {
        let pending = self.store().pending_deletes();
        let mut outcomes = Vec::with_capacity(pending.len());

        for filter in pending {
            log::info!("Resuming deletion of filter '{}' (ID: {})", filter.name, filter.id);
            match self.delete_filter(&filter.id).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => log::warn!("Could not resume deletion of {}: {}", filter.id, e),
            }
        }

        outcomes
    }

    /// Retry removing orphaned Gmail rules, returning how many were cleared
    pub async fn retry_orphans(&self) -> usize {
        let orphans = self.store().orphans().to_vec();
        let mut cleared = 0;

        for orphan in orphans {
            let result = self.api.delete_filter(&orphan.gmail_filter_id).await;
            let gone = match result {
                Ok(()) => true,
                Err(e) if e.status() == Some(404) => true,
                Err(e) => {
                    log::warn!("Gmail filter {} still orphaned: {}", orphan.gmail_filter_id, e);
                    false
                }
            };

            if gone {
                match self.store().clear_orphan(&orphan.gmail_filter_id) {
                    Ok(()) => cleared += 1,
                    Err(e) => log::error!("Failed to update orphan ledger: {}", e),
                }
            }
        }

        cleared
    }

    /// Roll back a Gmail rule whose local record could not be saved
    async fn discard_remote(&self, gmail_filter_id: &str, filter_name: &str) {
        if let Err(e) = self.api.delete_filter(gmail_filter_id).await {
            log::warn!("Could not roll back Gmail filter {}: {}", gmail_filter_id, e);
            if let Err(e) = self.store().record_orphan(gmail_filter_id, filter_name) {
                log::error!("Failed to record orphaned Gmail filter {}: {}", gmail_filter_id, e);
            }
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Filter {filter_id} is busy ({operation})")]
    Busy {
        filter_id: String,
        operation: FilterOperation,
    },

    #[error("Filter not found: {0}")]
    NotFound(String),

    #[error("Filter {0} is already synced to Gmail")]
    AlreadySynced(String),

    #[error("Gmail permissions need to be granted again")]
    NeedsReauth { redirected: bool },

    #[error("{0}")]
    Remote(String),

    #[error("Failed to save filters: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            StoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::Store(other),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
