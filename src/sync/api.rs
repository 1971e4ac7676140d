//! Filter API Client - HTTP communication with the Smart Filters backend
//!
//! Handles the REST calls that mirror a local filter into Gmail:
//! - Dry-run test against the whole mailbox
//! - Provider-side filter creation
//! - Retroactive apply
//! - Provider-side filter deletion
//!
//! Session auth is cookie-based; the client keeps a cookie store.

use super::models::{
    ApplyResult, CreateFilterResponse, ErrorResponse, FilterRequest, FilterTestResult,
};
use crate::config::{ClientConfig, ConfigError};
use crate::filters::Filter;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

/// Remote side of the filter lifecycle
#[async_trait]
pub trait FilterApi: Send + Sync {
    /// `POST /api/filters/test`
    async fn test_filter(&self, filter: &Filter) -> Result<FilterTestResult, FilterApiError>;

    /// `POST /api/filters/create`, returning the Gmail filter id
    async fn create_filter(&self, filter: &Filter) -> Result<String, FilterApiError>;

    /// `POST /api/filters/apply`
    async fn apply_filter(&self, filter: &Filter) -> Result<ApplyResult, FilterApiError>;

    /// `DELETE /api/filters/{gmailFilterId}`
    async fn delete_filter(&self, gmail_filter_id: &str) -> Result<(), FilterApiError>;
}

/// reqwest implementation of [`FilterApi`]
pub struct FilterApiClient {
    client: Client,
    base_url: Url,
}

impl FilterApiClient {
    /// Create new API client
    pub fn new(config: &ClientConfig) -> Result<Self, FilterApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url()?,
        })
    }

    /// Use a caller-built client, e.g. one already carrying the session cookie
    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FilterApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FilterApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_filter<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        filter: &Filter,
    ) -> Result<T, FilterApiError> {
        let url = self.endpoint(&["api", "filters", action])?;
        log::debug!("POST {} for filter ID: {}", url, filter.id);

        let response = self
            .client
            .post(url)
            .json(&FilterRequest { filter })
            .send()
            .await?;

        handle_response(response).await
    }
}

#[async_trait]
impl FilterApi for FilterApiClient {
    async fn test_filter(&self, filter: &Filter) -> Result<FilterTestResult, FilterApiError> {
        self.post_filter("test", filter).await
    }

    async fn create_filter(&self, filter: &Filter) -> Result<String, FilterApiError> {
        let created: CreateFilterResponse = self.post_filter("create", filter).await?;
        Ok(created.filter_id)
    }

    async fn apply_filter(&self, filter: &Filter) -> Result<ApplyResult, FilterApiError> {
        self.post_filter("apply", filter).await
    }

    async fn delete_filter(&self, gmail_filter_id: &str) -> Result<(), FilterApiError> {
        let url = self.endpoint(&["api", "filters", gmail_filter_id])?;
        log::debug!("DELETE {}", url);

        let response = self.client.delete(url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(handle_error(response).await)
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FilterApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gmail permissions need to be granted again")]
    NeedsReauth { message: Option<String> },

    #[error("Not signed in: {}", .message.as_deref().unwrap_or("session expired"))]
    Unauthorized { message: Option<String> },

    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("Invalid response from server")]
    InvalidResponse,

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl From<ConfigError> for FilterApiError {
    fn from(e: ConfigError) -> Self {
        FilterApiError::InvalidUrl(e.to_string())
    }
}

impl FilterApiError {
    /// Error text supplied by the server, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            FilterApiError::NeedsReauth { message }
            | FilterApiError::Unauthorized { message }
            | FilterApiError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FilterApiError::Server { status, .. } => Some(*status),
            FilterApiError::NeedsReauth { .. } => Some(StatusCode::FORBIDDEN.as_u16()),
            FilterApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            FilterApiError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Handle successful JSON response
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, FilterApiError> {
    let status = response.status();

    if status.is_success() {
        response.json::<T>().await.map_err(|e| {
            log::warn!("Unexpected response body: {}", e);
            FilterApiError::InvalidResponse
        })
    } else {
        Err(handle_error(response).await)
    }
}

/// Convert error response to FilterApiError
async fn handle_error(response: reqwest::Response) -> FilterApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorResponse = serde_json::from_str(&body).unwrap_or_default();

    if status == StatusCode::FORBIDDEN && parsed.needs_reauth {
        return FilterApiError::NeedsReauth {
            message: parsed.text(),
        };
    }

    if status == StatusCode::UNAUTHORIZED {
        return FilterApiError::Unauthorized {
            message: parsed.text(),
        };
    }

    let message = parsed.text().or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
    });

    FilterApiError::Server {
        status: status.as_u16(),
        message,
    }
}

// ============================================================================
// Tests
// ============================================================================
