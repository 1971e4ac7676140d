//! Filter actions to perform on matched emails

use serde::{Deserialize, Serialize};

/// Action to perform when filter matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub value: String,
}

/// Types of actions that can be performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Apply a Gmail label; the value is the label name
    Label,
    /// Skip the inbox
    Archive,
    /// Star the message
    Star,
    /// Move into a Gmail category tab
    Category,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Label => "label",
            ActionType::Archive => "archive",
            ActionType::Star => "star",
            ActionType::Category => "category",
        }
    }
}

impl Action {
    /// Create an add label action
    pub fn label(name: impl Into<String>) -> Self {
        Self {
            kind: ActionType::Label,
            value: name.into(),
        }
    }

    /// Create an archive action
    pub fn archive() -> Self {
        Self {
            kind: ActionType::Archive,
            value: "true".to_string(),
        }
    }

    /// Create a star action
    pub fn star() -> Self {
        Self {
            kind: ActionType::Star,
            value: "true".to_string(),
        }
    }

    /// Create a move to category action
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            kind: ActionType::Category,
            value: category.into(),
        }
    }

    pub fn is_label(&self) -> bool {
        self.kind == ActionType::Label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_json_uses_type_key() {
        let json = serde_json::to_value(Action::label("Receipts")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "label", "value": "Receipts"}));

        let parsed: Action = serde_json::from_str(r#"{"type":"archive","value":"true"}"#).unwrap();
        assert_eq!(parsed, Action::archive());
    }

    #[test]
    fn test_unknown_action_type_rejected() {
        assert!(serde_json::from_str::<Action>(r#"{"type":"forward","value":"x"}"#).is_err());
    }
}
