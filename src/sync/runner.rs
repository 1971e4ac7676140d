//! Dry-run and retroactive apply
//!
//! Both hand the filter to the backend, which owns translating conditions
//! into a Gmail query and evaluates them against the whole mailbox.

use super::api::FilterApi;
use super::coordinator::{Reauth, SyncResult};
use super::models::{ApplyResult, FilterTestResult};
use super::state::{FilterOperation, OperationTracker};
use crate::filters::Filter;
use std::sync::Arc;

/// Read-only preview of what a filter would match
#[derive(Clone)]
pub struct TestRunner {
    api: Arc<dyn FilterApi>,
    tracker: Arc<OperationTracker>,
    reauth: Reauth,
}

impl TestRunner {
    pub(crate) fn new(
        api: Arc<dyn FilterApi>,
        tracker: Arc<OperationTracker>,
        reauth: Reauth,
    ) -> Self {
        Self {
            api,
            tracker,
            reauth,
        }
    }

    /// Ask the backend for the match count, a preview and the translated query.
    ///
    /// Works for Draft and Synced filters alike and changes nothing.
    pub async fn test_filter(&self, filter: &Filter) -> SyncResult<FilterTestResult> {
        filter.validate()?;
        let _guard = self.tracker.begin(&filter.id, FilterOperation::Testing)?;

        let result = self
            .api
            .test_filter(filter)
            .await
            .map_err(|e| self.reauth.handle(e, "Failed to test filter"))?;

        log::info!(
            "Filter '{}' (ID: {}) would match {} emails ({})",
            filter.name,
            filter.id,
            result.count,
            result.query
        );
        Ok(result)
    }
}

/// Runs a filter's actions over every existing matching email
#[derive(Clone)]
pub struct ApplyExecutor {
    api: Arc<dyn FilterApi>,
    tracker: Arc<OperationTracker>,
    reauth: Reauth,
}

impl ApplyExecutor {
    pub(crate) fn new(
        api: Arc<dyn FilterApi>,
        tracker: Arc<OperationTracker>,
        reauth: Reauth,
    ) -> Self {
        Self {
            api,
            tracker,
            reauth,
        }
    }

    /// Apply the filter to the entire mailbox. There is no undo.
    pub async fn apply_now(&self, filter: &Filter) -> SyncResult<ApplyResult> {
        filter.validate()?;
        let _guard = self.tracker.begin(&filter.id, FilterOperation::Applying)?;

        log::info!("Applying filter '{}' (ID: {}) to existing mail", filter.name, filter.id);

        let result = self
            .api
            .apply_filter(filter)
            .await
            .map_err(|e| self.reauth.handle(e, "Failed to apply filter"))?;

        log::info!(
            "Filter '{}' (ID: {}) applied to {} emails",
            filter.name,
            filter.id,
            result.count
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Action, Condition, ConditionField, ConditionOperator, Email, FilterDraft};
    use crate::sync::coordinator::SyncError;
    use crate::sync::mock::{MockFilterApi, RecordingReauth, Reply};
    use chrono::Utc;

    fn filter() -> Filter {
        Filter::from_draft(
            "7".to_string(),
            FilterDraft {
                name: "Receipts".to_string(),
                enabled: true,
                conditions: vec![Condition::new(
                    ConditionField::Subject,
                    ConditionOperator::StartsWith,
                    "receipt",
                )
                .unwrap()],
                actions: vec![Action::label("Receipts"), Action::archive()],
            },
            Utc::now(),
        )
    }

    type Parts = (
        Arc<MockFilterApi>,
        Arc<OperationTracker>,
        Reauth,
        Arc<RecordingReauth>,
    );

    fn parts(accept: bool) -> Parts {
        let api = Arc::new(MockFilterApi::default());
        let handler = Arc::new(RecordingReauth::new(accept));
        let reauth = Reauth::new(handler.clone(), "https://app.example.com/reauth".to_string());
        (api, OperationTracker::new(), reauth, handler)
    }

    #[tokio::test]
    async fn test_dry_run_returns_backend_result() {
        let (api, tracker, reauth, _) = parts(false);
        api.set_test(Reply::Ok(FilterTestResult {
            emails: vec![Email {
                id: "m1".to_string(),
                subject: Some("Receipt #1".to_string()),
                ..Default::default()
            }],
            count: 31,
            query: "subject:(receipt)".to_string(),
        }));
        let runner = TestRunner::new(api.clone(), tracker.clone(), reauth);

        let result = runner.test_filter(&filter()).await.unwrap();

        assert_eq!(result.count, 31);
        assert_eq!(result.emails.len(), 1);
        assert_eq!(result.query, "subject:(receipt)");
        assert_eq!(tracker.state("7"), FilterOperation::Idle);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_need_sync() {
        let (api, tracker, reauth, _) = parts(false);
        let runner = TestRunner::new(api.clone(), tracker, reauth);
        let draft = filter();
        assert!(!draft.is_synced());

        runner.test_filter(&draft).await.unwrap();
        assert_eq!(api.calls(), vec!["test:Receipts".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_filter_never_reaches_backend() {
        let (api, tracker, reauth, _) = parts(false);
        let executor = ApplyExecutor::new(api.clone(), tracker, reauth);
        let mut bad = filter();
        bad.actions = vec![Action::label("a/b")];

        assert!(matches!(executor.apply_now(&bad).await, Err(SyncError::Validation(_))));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_apply_reports_affected_count() {
        let (api, tracker, reauth, _) = parts(false);
        api.set_apply(Reply::Ok(ApplyResult { count: 128 }));
        let executor = ApplyExecutor::new(api, tracker.clone(), reauth);

        let result = executor.apply_now(&filter()).await.unwrap();
        assert_eq!(result.count, 128);
        assert_eq!(tracker.state("7"), FilterOperation::Idle);
    }

    #[tokio::test]
    async fn test_apply_failure_resets_state() {
        let (api, tracker, reauth, _) = parts(false);
        api.set_apply(Reply::Server(500, Some("Gmail API rate limit".to_string())));
        let executor = ApplyExecutor::new(api, tracker.clone(), reauth);

        let err = executor.apply_now(&filter()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to apply filter: Gmail API rate limit");
        assert_eq!(tracker.state("7"), FilterOperation::Idle);
    }

    #[tokio::test]
    async fn test_apply_needs_reauth_prompts() {
        let (api, tracker, reauth, handler) = parts(true);
        api.set_apply(Reply::NeedsReauth);
        let executor = ApplyExecutor::new(api, tracker, reauth);

        let err = executor.apply_now(&filter()).await.unwrap_err();
        assert!(matches!(err, SyncError::NeedsReauth { redirected: true }));
        assert_eq!(handler.redirects(), vec!["https://app.example.com/reauth".to_string()]);
    }

    #[tokio::test]
    async fn test_test_and_apply_share_the_busy_state() {
        let (api, tracker, reauth, _) = parts(false);
        let runner = TestRunner::new(api.clone(), tracker.clone(), reauth.clone());
        let executor = ApplyExecutor::new(api.clone(), tracker, reauth);
        let release = api.hold();
        let f = filter();

        let (tested, applied) = tokio::join!(runner.test_filter(&f), async {
            let applied = executor.apply_now(&f).await;
            release.notify_one();
            applied
        });

        assert!(tested.is_ok());
        assert!(matches!(
            applied,
            Err(SyncError::Busy { operation: FilterOperation::Testing, .. })
        ));
    }
}
