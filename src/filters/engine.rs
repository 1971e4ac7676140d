//! Filter engine - evaluates filters against locally loaded emails
//!
//! Counts produced here are approximate: the local collection may only be the
//! page of mail the inbox has loaded. Test and apply go through the provider.

use super::{Email, Filter};

/// Stateless matcher for filters against email collections
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterMatcher;

impl FilterMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Test if a single filter matches an email.
    ///
    /// All conditions must match; a filter without conditions matches nothing.
    pub fn matches(&self, email: &Email, filter: &Filter) -> bool {
        if filter.conditions.is_empty() {
            return false;
        }

        filter.conditions.iter().all(|cond| cond.evaluate(email))
    }

    /// Emails from `emails` the filter matches, in input order
    pub fn apply_to_collection<'a>(&self, emails: &'a [Email], filter: &Filter) -> Vec<&'a Email> {
        let matched: Vec<&Email> = emails
            .iter()
            .filter(|email| self.matches(email, filter))
            .collect();

        log::debug!(
            "Filter '{}' (ID: {}) matched {} of {} local emails",
            filter.name,
            filter.id,
            matched.len(),
            emails.len()
        );

        matched
    }

    pub fn count_matches(&self, emails: &[Email], filter: &Filter) -> usize {
        emails.iter().filter(|email| self.matches(email, filter)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Action, Condition, ConditionField, ConditionOperator, FilterDraft};
    use chrono::Utc;

    fn email(id: &str, sender: &str, subject: &str) -> Email {
        Email {
            id: id.to_string(),
            sender: Some(sender.to_string()),
            subject: Some(subject.to_string()),
            ..Default::default()
        }
    }

    fn filter(conditions: Vec<Condition>) -> Filter {
        Filter::from_draft(
            "1".to_string(),
            FilterDraft {
                name: "Test Filter".to_string(),
                enabled: true,
                conditions,
                actions: vec![Action::archive()],
            },
            Utc::now(),
        )
    }

    fn cond(field: ConditionField, operator: ConditionOperator, value: &str) -> Condition {
        Condition::new(field, operator, value).unwrap()
    }

    #[test]
    fn test_newsletter_archive_scenario() {
        let emails = vec![
            email("a", "Newsletter <newsletter@medium.com>", "Daily digest"),
            email("b", "friend@example.com", "Lunch?"),
        ];
        let filter = filter(vec![cond(
            ConditionField::Sender,
            ConditionOperator::Contains,
            "newsletter@medium.com",
        )]);

        let matched = FilterMatcher::new().apply_to_collection(&emails, &filter);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "a");
    }

    #[test]
    fn test_filter_matching_all_conditions() {
        let matcher = FilterMatcher::new();
        let email = email("a", "user@example.com", "This is a test subject");

        let both = filter(vec![
            cond(ConditionField::Sender, ConditionOperator::Contains, "example"),
            cond(ConditionField::Subject, ConditionOperator::Contains, "test"),
        ]);
        assert!(matcher.matches(&email, &both));

        let one_false = filter(vec![
            cond(ConditionField::Sender, ConditionOperator::Contains, "example"),
            cond(ConditionField::Subject, ConditionOperator::Contains, "test"),
            cond(ConditionField::Subject, ConditionOperator::StartsWith, "invoice"),
        ]);
        assert!(!matcher.matches(&email, &one_false));
    }

    #[test]
    fn test_empty_conditions_match_nothing() {
        let matcher = FilterMatcher::new();
        let emails = vec![email("a", "x@y.z", "hello")];
        let empty = filter(vec![]);

        assert!(!matcher.matches(&emails[0], &empty));
        assert!(matcher.apply_to_collection(&emails, &empty).is_empty());
        assert_eq!(matcher.count_matches(&emails, &empty), 0);
    }

    #[test]
    fn test_count_matches_agrees_with_collection() {
        let matcher = FilterMatcher::new();
        let emails = vec![
            email("a", "billing@shop.com", "Receipt #1"),
            email("b", "billing@shop.com", "Receipt #2"),
            email("c", "news@shop.com", "Sale"),
        ];
        let filter = filter(vec![cond(
            ConditionField::Subject,
            ConditionOperator::StartsWith,
            "receipt",
        )]);

        assert_eq!(matcher.count_matches(&emails, &filter), 2);
        assert_eq!(matcher.apply_to_collection(&emails, &filter).len(), 2);
    }
}
