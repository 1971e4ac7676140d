//! Filter condition matching logic
//!
//! Each condition field carries its own operator set, so a field/operator
//! pair that the rule language does not allow cannot be constructed or
//! deserialized. The JSON shape stays `{ "field", "operator", "value" }`.

use super::validation::ValidationError;
use super::Email;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter condition to match against emails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "lowercase")]
pub enum Condition {
    Sender { operator: SenderOperator, value: String },
    Subject { operator: SubjectOperator, value: String },
    Body { operator: BodyOperator, value: String },
    Category { operator: CategoryOperator, value: String },
}

/// Email fields that can be filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    Sender,
    Subject,
    Body,
    Category,
}

/// Every operator name the rule language knows, regardless of field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionOperator {
    Contains,
    NotContains,
    Equals,
    StartsWith,
    EndsWith,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SenderOperator {
    Contains,
    Equals,
    NotContains,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectOperator {
    Contains,
    Equals,
    StartsWith,
    NotContains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyOperator {
    Contains,
    NotContains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryOperator {
    Is,
    IsNot,
}

/// String comparison every field operator reduces to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
}

impl Comparison {
    fn apply(self, haystack: &str, needle: &str) -> bool {
        match self {
            Comparison::Contains => haystack.contains(needle),
            Comparison::NotContains => !haystack.contains(needle),
            Comparison::Equals => haystack == needle,
            Comparison::NotEquals => haystack != needle,
            Comparison::StartsWith => haystack.starts_with(needle),
            Comparison::EndsWith => haystack.ends_with(needle),
        }
    }
}

impl ConditionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::Sender => "sender",
            ConditionField::Subject => "subject",
            ConditionField::Body => "body",
            ConditionField::Category => "category",
        }
    }

    /// Operators the UI may offer for this field
    pub fn operators(&self) -> &'static [ConditionOperator] {
        use ConditionOperator::*;
        match self {
            ConditionField::Sender => &[Contains, Equals, NotContains, EndsWith],
            ConditionField::Subject => &[Contains, Equals, StartsWith, NotContains],
            ConditionField::Body => &[Contains, NotContains],
            ConditionField::Category => &[Is, IsNot],
        }
    }
}

impl fmt::Display for ConditionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "not-contains",
            ConditionOperator::Equals => "equals",
            ConditionOperator::StartsWith => "starts-with",
            ConditionOperator::EndsWith => "ends-with",
            ConditionOperator::Is => "is",
            ConditionOperator::IsNot => "is-not",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Condition {
    /// Build a condition from the loose field/operator pair a form submits.
    ///
    /// Fails with [`ValidationError::InvalidOperator`] when the operator is not
    /// permitted for the field.
    pub fn new(
        field: ConditionField,
        operator: ConditionOperator,
        value: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        use ConditionOperator as Op;

        let value = value.into();
        let invalid = || ValidationError::InvalidOperator { field, operator };

        let condition = match field {
            ConditionField::Sender => Condition::Sender {
                operator: match operator {
                    Op::Contains => SenderOperator::Contains,
                    Op::Equals => SenderOperator::Equals,
                    Op::NotContains => SenderOperator::NotContains,
                    Op::EndsWith => SenderOperator::EndsWith,
                    _ => return Err(invalid()),
                },
                value,
            },
            ConditionField::Subject => Condition::Subject {
                operator: match operator {
                    Op::Contains => SubjectOperator::Contains,
                    Op::Equals => SubjectOperator::Equals,
                    Op::StartsWith => SubjectOperator::StartsWith,
                    Op::NotContains => SubjectOperator::NotContains,
                    _ => return Err(invalid()),
                },
                value,
            },
            ConditionField::Body => Condition::Body {
                operator: match operator {
                    Op::Contains => BodyOperator::Contains,
                    Op::NotContains => BodyOperator::NotContains,
                    _ => return Err(invalid()),
                },
                value,
            },
            ConditionField::Category => Condition::Category {
                operator: match operator {
                    Op::Is => CategoryOperator::Is,
                    Op::IsNot => CategoryOperator::IsNot,
                    _ => return Err(invalid()),
                },
                value,
            },
        };

        Ok(condition)
    }

    pub fn field(&self) -> ConditionField {
        match self {
            Condition::Sender { .. } => ConditionField::Sender,
            Condition::Subject { .. } => ConditionField::Subject,
            Condition::Body { .. } => ConditionField::Body,
            Condition::Category { .. } => ConditionField::Category,
        }
    }

    pub fn operator(&self) -> ConditionOperator {
        use ConditionOperator as Op;
        match self {
            Condition::Sender { operator, .. } => match operator {
                SenderOperator::Contains => Op::Contains,
                SenderOperator::Equals => Op::Equals,
                SenderOperator::NotContains => Op::NotContains,
                SenderOperator::EndsWith => Op::EndsWith,
            },
            Condition::Subject { operator, .. } => match operator {
                SubjectOperator::Contains => Op::Contains,
                SubjectOperator::Equals => Op::Equals,
                SubjectOperator::StartsWith => Op::StartsWith,
                SubjectOperator::NotContains => Op::NotContains,
            },
            Condition::Body { operator, .. } => match operator {
                BodyOperator::Contains => Op::Contains,
                BodyOperator::NotContains => Op::NotContains,
            },
            Condition::Category { operator, .. } => match operator {
                CategoryOperator::Is => Op::Is,
                CategoryOperator::IsNot => Op::IsNot,
            },
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Condition::Sender { value, .. }
            | Condition::Subject { value, .. }
            | Condition::Body { value, .. }
            | Condition::Category { value, .. } => value,
        }
    }

    /// Test if this condition matches the given email.
    ///
    /// Both sides are lower-cased; a missing email field compares as "".
    pub fn evaluate(&self, email: &Email) -> bool {
        let field_value = self.get_field_value(email).to_lowercase();
        let search_value = self.value().to_lowercase();

        self.comparison().apply(&field_value, &search_value)
    }

    fn comparison(&self) -> Comparison {
        match self.operator() {
            ConditionOperator::Contains => Comparison::Contains,
            ConditionOperator::NotContains => Comparison::NotContains,
            ConditionOperator::Equals | ConditionOperator::Is => Comparison::Equals,
            ConditionOperator::IsNot => Comparison::NotEquals,
            ConditionOperator::StartsWith => Comparison::StartsWith,
            ConditionOperator::EndsWith => Comparison::EndsWith,
        }
    }

    /// Extract field value from email
    fn get_field_value<'a>(&self, email: &'a Email) -> &'a str {
        match self {
            Condition::Sender { .. } => email.sender.as_deref().unwrap_or(""),
            Condition::Subject { .. } => email.subject.as_deref().unwrap_or(""),
            Condition::Body { .. } => email.body_text(),
            Condition::Category { .. } => email.category.as_deref().unwrap_or(""),
        }
    }
}
