//! Smart Filters facade
//!
//! Wires the store, the local matcher and the remote operations together the
//! way the Smart Filters screen uses them.

use crate::config::ClientConfig;
use crate::filters::{
    normalize_label_actions, Email, Filter, FilterDraft, FilterMatcher, FilterPatch,
};
use crate::store::{
    FilterPersistence, FilterStats, FilterStore, JsonFileStore, OrphanedRule, StoreError,
};
use crate::sync::coordinator::Reauth;
use crate::sync::{
    ApplyExecutor, ApplyResult, DeleteOutcome, FilterApi, FilterApiClient, FilterApiError,
    FilterOperation, FilterTestResult, OperationTracker, ReauthHandler, SyncCoordinator,
    SyncError, SyncResult, TestRunner,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Startup error types
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("API client error: {0}")]
    Api(#[from] FilterApiError),
}

/// Everything the Smart Filters screen talks to
pub struct SmartFilters {
    store: Arc<Mutex<FilterStore>>,
    tracker: Arc<OperationTracker>,
    matcher: FilterMatcher,
    coordinator: SyncCoordinator,
    test_runner: TestRunner,
    apply_executor: ApplyExecutor,
    draft_seq: AtomicU64,
}

impl SmartFilters {
    /// Open the JSON store under `config.storage_dir` and talk to `config.api_base_url`
    pub fn open(config: &ClientConfig, reauth: Arc<dyn ReauthHandler>) -> Result<Self, InitError> {
        config.validate()?;
        let persistence = Arc::new(JsonFileStore::new(&config.storage_dir)?);
        let api = Arc::new(FilterApiClient::new(config)?);
        Self::with_parts(persistence, api, reauth, config.reauth_url.clone())
    }

    /// Build from injected persistence and API implementations
    pub fn with_parts(
        persistence: Arc<dyn FilterPersistence>,
        api: Arc<dyn FilterApi>,
        reauth: Arc<dyn ReauthHandler>,
        reauth_url: String,
    ) -> Result<Self, InitError> {
        let store = Arc::new(Mutex::new(FilterStore::open(persistence)?));
        let tracker = OperationTracker::new();
        let reauth = Reauth::new(reauth, reauth_url);

        Ok(Self {
            coordinator: SyncCoordinator::new(
                api.clone(),
                store.clone(),
                tracker.clone(),
                reauth.clone(),
            ),
            test_runner: TestRunner::new(api.clone(), tracker.clone(), reauth.clone()),
            apply_executor: ApplyExecutor::new(api, tracker.clone(), reauth),
            matcher: FilterMatcher::new(),
            store,
            tracker,
            draft_seq: AtomicU64::new(0),
        })
    }

    fn store(&self) -> MutexGuard<'_, FilterStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn filter(&self, id: &str) -> SyncResult<Filter> {
        self.store()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    // ========================================================================
    // Local collection
    // ========================================================================

    pub fn list(&self) -> Vec<Filter> {
        self.store().list().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<Filter> {
        self.store().get(id).cloned()
    }

    pub fn create(&self, draft: FilterDraft) -> Result<String, StoreError> {
        self.store().create(draft)
    }

    pub fn update(&self, id: &str, patch: FilterPatch) -> Result<(), StoreError> {
        self.store().update(id, patch)
    }

    pub fn toggle_enabled(&self, id: &str) -> Result<bool, StoreError> {
        self.store().toggle_enabled(id)
    }

    pub fn stats(&self) -> FilterStats {
        self.store().stats()
    }

    pub fn orphans(&self) -> Vec<OrphanedRule> {
        self.store().orphans().to_vec()
    }

    pub fn operation(&self, id: &str) -> FilterOperation {
        self.tracker.state(id)
    }

    // ========================================================================
    // Local matching
    // ========================================================================

    /// Approximate matches among the emails loaded in the inbox
    pub fn local_matches<'a>(&self, id: &str, emails: &'a [Email]) -> SyncResult<Vec<&'a Email>> {
        let filter = self.filter(id)?;
        Ok(self.matcher.apply_to_collection(emails, &filter))
    }

    /// Approximate match count per enabled filter, in list order
    pub fn local_match_counts(&self, emails: &[Email]) -> Vec<(String, usize)> {
        self.store()
            .active()
            .map(|filter| (filter.id.clone(), self.matcher.count_matches(emails, filter)))
            .collect()
    }

    // ========================================================================
    // Remote operations
    // ========================================================================

    pub async fn sync_to_gmail(&self, id: &str) -> SyncResult<String> {
        self.coordinator.sync_to_gmail(id).await
    }

    pub async fn delete(&self, id: &str) -> SyncResult<DeleteOutcome> {
        self.coordinator.delete_filter(id).await
    }

    pub async fn test_filter(&self, id: &str) -> SyncResult<FilterTestResult> {
        let filter = self.filter(id)?;
        self.test_runner.test_filter(&filter).await
    }

    /// Dry-run an unsaved draft from the editor.
    ///
    /// Each call gets its own `draft-N` key, so open editors never block each other.
    pub async fn test_draft(&self, mut draft: FilterDraft) -> SyncResult<FilterTestResult> {
        draft.validate()?;
        normalize_label_actions(&mut draft.actions)?;

        let key = format!("draft-{}", self.draft_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let filter = Filter::from_draft(key, draft, chrono::Utc::now());
        self.test_runner.test_filter(&filter).await
    }

    pub async fn apply_now(&self, id: &str) -> SyncResult<ApplyResult> {
        let filter = self.filter(id)?;
        self.apply_executor.apply_now(&filter).await
    }

    /// Finish interrupted deletes and retry orphaned Gmail rules
    pub async fn reconcile(&self) -> (Vec<DeleteOutcome>, usize) {
        let resumed = self.coordinator.resume_pending_deletes().await;
        let cleared = self.coordinator.retry_orphans().await;
        (resumed, cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Action, Condition, ConditionField, ConditionOperator};
    use crate::store::MemoryStore;
    use crate::sync::mock::{MockFilterApi, RecordingReauth, Reply};

    fn draft(name: &str) -> FilterDraft {
        FilterDraft {
            name: name.to_string(),
            enabled: true,
            conditions: vec![Condition::new(
                ConditionField::Subject,
                ConditionOperator::Contains,
                "invoice",
            )
            .unwrap()],
            actions: vec![Action::label(" Invoices ")],
        }
    }

    fn smart_filters() -> (Arc<MockFilterApi>, SmartFilters) {
        let api = Arc::new(MockFilterApi::default());
        let filters = SmartFilters::with_parts(
            Arc::new(MemoryStore::new()),
            api.clone(),
            Arc::new(RecordingReauth::new(false)),
            "https://app.example.com/reauth".to_string(),
        )
        .unwrap();
        (api, filters)
    }

    #[tokio::test]
    async fn test_concurrent_draft_dry_runs_do_not_block_each_other() {
        let (api, filters) = smart_filters();
        api.set_test(Reply::Ok(FilterTestResult {
            count: 4,
            ..Default::default()
        }));
        let release = api.hold();

        let (first, second) = tokio::join!(filters.test_draft(draft("First editor")), async {
            let second = filters.test_draft(draft("Second editor")).await;
            release.notify_one();
            second
        });

        assert_eq!(first.unwrap().count, 4);
        assert_eq!(second.unwrap().count, 4);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_draft_is_not_sent() {
        let (api, filters) = smart_filters();
        let mut bad = draft("Bad");
        bad.actions = vec![Action::label("Work/Projects")];

        assert!(matches!(
            filters.test_draft(bad).await,
            Err(SyncError::Validation(_))
        ));
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_created_label_is_trimmed() {
        let (_api, filters) = smart_filters();
        let id = filters.create(draft("Invoices")).unwrap();
        assert_eq!(filters.get(&id).unwrap().actions[0].value, "Invoices");
    }
}
