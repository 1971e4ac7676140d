//! Scripted [`FilterApi`] and [`ReauthHandler`] for unit tests

use super::api::{FilterApi, FilterApiError};
use super::coordinator::ReauthHandler;
use super::models::{ApplyResult, FilterTestResult};
use crate::filters::Filter;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    NeedsReauth,
    Server(u16, Option<String>),
}

impl<T: Clone> Reply<T> {
    fn to_result(&self) -> Result<T, FilterApiError> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::NeedsReauth => Err(FilterApiError::NeedsReauth { message: None }),
            Reply::Server(status, message) => Err(FilterApiError::Server {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

pub(crate) struct MockFilterApi {
    create: Mutex<Reply<String>>,
    test: Mutex<Reply<FilterTestResult>>,
    apply: Mutex<Reply<ApplyResult>>,
    delete: Mutex<Reply<()>>,
    calls: Mutex<Vec<String>>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl Default for MockFilterApi {
    fn default() -> Self {
        Self {
            create: Mutex::new(Reply::Ok("gmail-filter-1".to_string())),
            test: Mutex::new(Reply::Ok(FilterTestResult::default())),
            apply: Mutex::new(Reply::Ok(ApplyResult::default())),
            delete: Mutex::new(Reply::Ok(())),
            calls: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
        }
    }
}

impl MockFilterApi {
    pub(crate) fn set_create(&self, reply: Reply<String>) {
        *self.create.lock().unwrap() = reply;
    }

    pub(crate) fn set_test(&self, reply: Reply<FilterTestResult>) {
        *self.test.lock().unwrap() = reply;
    }

    pub(crate) fn set_apply(&self, reply: Reply<ApplyResult>) {
        *self.apply.lock().unwrap() = reply;
    }

    pub(crate) fn set_delete(&self, reply: Reply<()>) {
        *self.delete.lock().unwrap() = reply;
    }

    /// Make the next call wait until the returned handle is notified
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        let held = self.hold.lock().unwrap().take();
        if let Some(notify) = held {
            notify.notified().await;
        }
    }
}

#[async_trait]
impl FilterApi for MockFilterApi {
    async fn test_filter(&self, filter: &Filter) -> Result<FilterTestResult, FilterApiError> {
        self.record(format!("test:{}", filter.name)).await;
        let reply = self.test.lock().unwrap().clone();
        reply.to_result()
    }

    async fn create_filter(&self, filter: &Filter) -> Result<String, FilterApiError> {
        self.record(format!("create:{}", filter.name)).await;
        let reply = self.create.lock().unwrap().clone();
        reply.to_result()
    }

    async fn apply_filter(&self, filter: &Filter) -> Result<ApplyResult, FilterApiError> {
        self.record(format!("apply:{}", filter.name)).await;
        let reply = self.apply.lock().unwrap().clone();
        reply.to_result()
    }

    async fn delete_filter(&self, gmail_filter_id: &str) -> Result<(), FilterApiError> {
        self.record(format!("delete:{}", gmail_filter_id)).await;
        let reply = self.delete.lock().unwrap().clone();
        reply.to_result()
    }
}

pub(crate) struct RecordingReauth {
    accept: bool,
    prompts: Mutex<usize>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingReauth {
    pub(crate) fn new(accept: bool) -> Self {
        Self {
            accept,
            prompts: Mutex::new(0),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> usize {
        *self.prompts.lock().unwrap()
    }

    pub(crate) fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl ReauthHandler for RecordingReauth {
    fn confirm(&self, _message: &str) -> bool {
        *self.prompts.lock().unwrap() += 1;
        self.accept
    }

    fn redirect(&self, url: &str) {
        self.redirects.lock().unwrap().push(url.to_string());
    }
}
