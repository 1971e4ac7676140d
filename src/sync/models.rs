//! Wire types for the `/api/filters` endpoints

use crate::filters::{Email, Filter};
use serde::{Deserialize, Serialize};

/// Body of every filter request: `{ "filter": ... }`
#[derive(Debug, Clone, Serialize)]
pub struct FilterRequest<'a> {
    pub filter: &'a Filter,
}

/// Dry-run result: authoritative count plus a preview of the first matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterTestResult {
    #[serde(default)]
    pub emails: Vec<Email>,
    pub count: u64,
    /// Gmail search query the backend translated the conditions into
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFilterResponse {
    pub filter_id: String,
}

/// Number of existing emails the filter's actions were applied to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub count: u64,
}

/// Error body; `needsReauth` accompanies 403 when Gmail scopes are missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub needs_reauth: bool,
}

impl ErrorResponse {
    pub fn text(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|text| !text.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_prefers_error_field() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"error":"Insufficient permissions","needsReauth":true}"#)
                .unwrap();
        assert!(body.needs_reauth);
        assert_eq!(body.text().as_deref(), Some("Insufficient permissions"));

        let body: ErrorResponse = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert!(!body.needs_reauth);
        assert!(body.text().is_none());
    }

    #[test]
    fn test_test_result_tolerates_missing_preview() {
        let result: FilterTestResult = serde_json::from_str(r#"{"count": 12}"#).unwrap();
        assert_eq!(result.count, 12);
        assert!(result.emails.is_empty());
        assert!(result.query.is_empty());
    }
}
