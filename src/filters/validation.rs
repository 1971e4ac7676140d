//! Rule validation run before any persistence or network action

use super::conditions::{ConditionField, ConditionOperator};
use super::{Action, Condition};
use thiserror::Error;

/// Gmail rejects label names longer than this
pub const MAX_LABEL_LENGTH: usize = 225;

/// Validation error types
///
/// The `Display` text is shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a filter name")]
    EmptyName,

    #[error("Please add at least one condition")]
    NoConditions,

    #[error("Please enter a value for the condition")]
    EmptyConditionValue,

    #[error("Please add at least one action")]
    NoActions,

    #[error("Please enter a value for every action")]
    EmptyActionValue,

    #[error("Label name cannot be empty")]
    EmptyLabel,

    #[error("Label name cannot exceed 225 characters")]
    LabelTooLong,

    #[error("Label name cannot contain \"/\" character")]
    LabelContainsSlash,

    #[error("Operator \"{operator}\" cannot be used with field \"{field}\"")]
    InvalidOperator {
        field: ConditionField,
        operator: ConditionOperator,
    },
}

/// Validate a Gmail label name, returning the trimmed name
pub fn validate_label_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyLabel);
    }

    if trimmed.chars().count() > MAX_LABEL_LENGTH {
        return Err(ValidationError::LabelTooLong);
    }

    if trimmed.contains('/') {
        return Err(ValidationError::LabelContainsSlash);
    }

    Ok(trimmed.to_string())
}

/// Validate every label action of a rule
pub fn validate_label_actions(actions: &[Action]) -> Result<(), ValidationError> {
    actions
        .iter()
        .filter(|action| action.is_label())
        .try_for_each(|action| validate_label_name(&action.value).map(|_| ()))
}

/// Replace every label action value with its trimmed, validated name
pub fn normalize_label_actions(actions: &mut [Action]) -> Result<(), ValidationError> {
    for action in actions.iter_mut().filter(|action| action.is_label()) {
        action.value = validate_label_name(&action.value)?;
    }
    Ok(())
}

/// Check a rule before it is saved.
///
/// Reports the first violation only; nothing is saved when this fails.
pub fn validate_filter_for_save(
    name: &str,
    conditions: &[Condition],
    actions: &[Action],
) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let first = conditions.first().ok_or(ValidationError::NoConditions)?;
    if first.value().trim().is_empty() {
        return Err(ValidationError::EmptyConditionValue);
    }

    if actions.is_empty() {
        return Err(ValidationError::NoActions);
    }

    for action in actions {
        if action.value.trim().is_empty() {
            return Err(ValidationError::EmptyActionValue);
        }
        if action.is_label() {
            validate_label_name(&action.value)?;
        }
    }

    Ok(())
}
