//! Smart filter rules
//!
//! Gmail-style rules made of conditions (combined with AND) and actions,
//! plus the read-only email view they are evaluated against.

pub mod actions;
pub mod conditions;
pub mod engine;
pub mod validation;

pub use actions::{Action, ActionType};
pub use conditions::{
    BodyOperator, CategoryOperator, Condition, ConditionField, ConditionOperator, SenderOperator,
    SubjectOperator,
};
pub use engine::FilterMatcher;
pub use validation::{
    normalize_label_actions, validate_filter_for_save, validate_label_actions,
    validate_label_name, ValidationError, MAX_LABEL_LENGTH,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email filter rule as persisted under the `smartFilters` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(default)]
    gmail_filter_id: Option<String>,
    #[serde(default)]
    synced_to_gmail: bool,
    /// Set while a remote deletion is in flight
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) pending_delete: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Whether a provider-side rule mirrors the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Draft,
    Synced,
}

/// New filter for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDraft {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

fn default_enabled() -> bool {
    true
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterPatch {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
}

impl Filter {
    pub(crate) fn from_draft(id: String, draft: FilterDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            enabled: draft.enabled,
            conditions: draft.conditions,
            actions: draft.actions,
            gmail_filter_id: None,
            synced_to_gmail: false,
            pending_delete: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn gmail_filter_id(&self) -> Option<&str> {
        self.gmail_filter_id.as_deref()
    }

    pub fn is_synced(&self) -> bool {
        self.synced_to_gmail
    }

    pub fn is_pending_delete(&self) -> bool {
        self.pending_delete
    }

    pub fn remote_state(&self) -> RemoteState {
        if self.synced_to_gmail {
            RemoteState::Synced
        } else {
            RemoteState::Draft
        }
    }

    /// Record the provider-side rule id; the two sync fields always move together
    pub(crate) fn mark_synced(&mut self, gmail_filter_id: String) {
        self.gmail_filter_id = Some(gmail_filter_id);
        self.synced_to_gmail = true;
    }

    pub(crate) fn mark_draft(&mut self) {
        self.gmail_filter_id = None;
        self.synced_to_gmail = false;
    }

    /// Repair records whose sync flag disagrees with the remote id.
    ///
    /// Returns true when something was changed.
    pub(crate) fn normalize_sync_state(&mut self) -> bool {
        let synced = self.gmail_filter_id.is_some();
        if self.synced_to_gmail != synced {
            self.synced_to_gmail = synced;
            return true;
        }
        false
    }

    pub(crate) fn apply_patch(&mut self, patch: FilterPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(conditions) = patch.conditions {
            self.conditions = conditions;
        }
        if let Some(actions) = patch.actions {
            self.actions = actions;
        }
    }

    /// Check the filter against the save rules
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_filter_for_save(&self.name, &self.conditions, &self.actions)
    }
}

impl FilterDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_filter_for_save(&self.name, &self.conditions, &self.actions)
    }
}

/// Email as supplied by the inbox listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
}

impl Email {
    /// Body text, falling back to the snippet when the full body is not loaded
    pub fn body_text(&self) -> &str {
        self.body
            .as_deref()
            .or(self.snippet.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> FilterDraft {
        FilterDraft {
            name: "Newsletters".to_string(),
            enabled: true,
            conditions: vec![Condition::new(
                ConditionField::Sender,
                ConditionOperator::Contains,
                "newsletter@medium.com",
            )
            .unwrap()],
            actions: vec![Action::archive()],
        }
    }

    #[test]
    fn test_sync_fields_move_together() {
        let mut filter = Filter::from_draft("1".to_string(), draft(), Utc::now());
        assert_eq!(filter.remote_state(), RemoteState::Draft);
        assert!(filter.gmail_filter_id().is_none());

        filter.mark_synced("ANe1Bm".to_string());
        assert!(filter.is_synced());
        assert_eq!(filter.gmail_filter_id(), Some("ANe1Bm"));

        filter.mark_draft();
        assert!(!filter.is_synced());
        assert!(filter.gmail_filter_id().is_none());
    }

    #[test]
    fn test_persisted_json_shape() {
        let mut filter = Filter::from_draft("1700000000000".to_string(), draft(), Utc::now());
        filter.mark_synced("ANe1Bm".to_string());

        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["gmailFilterId"], "ANe1Bm");
        assert_eq!(json["syncedToGmail"], true);
        assert_eq!(json["conditions"][0]["field"], "sender");
        assert_eq!(json["actions"][0]["type"], "archive");
        assert!(json.get("pendingDelete").is_none());
    }

    #[test]
    fn test_loads_record_without_timestamps() {
        let raw = r#"{
            "id": "1700000000000",
            "name": "Receipts",
            "enabled": false,
            "conditions": [{"field": "subject", "operator": "starts-with", "value": "Receipt"}],
            "actions": [{"type": "label", "value": "Receipts"}],
            "gmailFilterId": null,
            "syncedToGmail": true
        }"#;
        let mut filter: Filter = serde_json::from_str(raw).unwrap();
        assert!(filter.normalize_sync_state());
        assert!(!filter.is_synced());
        assert!(!filter.normalize_sync_state());
    }

    #[test]
    fn test_apply_patch_only_touches_given_fields() {
        let mut filter = Filter::from_draft("1".to_string(), draft(), Utc::now());
        filter.apply_patch(FilterPatch {
            name: Some("Medium".to_string()),
            ..Default::default()
        });
        assert_eq!(filter.name, "Medium");
        assert!(filter.enabled);
        assert_eq!(filter.actions, vec![Action::archive()]);
    }
}
