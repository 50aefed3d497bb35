//! CONDITION step evaluation.
//!
//! The payload field and the configured value are both compared in their
//! plain-text form (see [`value_to_text`]). A field that is absent from the
//! payload never matches, whatever the operator.

use legacymark_types::workflow::{ConditionOperator, ConditionStep};
use serde_json::Value;

use super::template::value_to_text;

/// Result of evaluating a condition, with the human-readable log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub matched: bool,
    pub details: String,
}

pub fn evaluate_condition(condition: &ConditionStep, payload: &Value) -> ConditionOutcome {
    let expected = value_to_text(&condition.value);
    let actual = payload.get(&condition.variable).map(value_to_text);

    let matched = match &actual {
        Some(actual) => match condition.operator {
            ConditionOperator::Contains => actual.contains(expected.as_str()),
            ConditionOperator::Equals => *actual == expected,
            ConditionOperator::StartsWith => actual.starts_with(expected.as_str()),
        },
        None => false,
    };

    let details = format!(
        "Check {} ({}) {} {} -> {}",
        condition.variable,
        actual.as_deref().unwrap_or("missing"),
        condition.operator,
        expected,
        matched
    );

    ConditionOutcome { matched, details }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(variable: &str, operator: ConditionOperator, value: Value) -> ConditionStep {
        ConditionStep {
            variable: variable.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_contains() {
        let c = cond("message", ConditionOperator::Contains, json!("pricing"));
        assert!(evaluate_condition(&c, &json!({"message": "need pricing info"})).matched);
        assert!(!evaluate_condition(&c, &json!({"message": "hello"})).matched);
    }

    #[test]
    fn test_equals_compares_text_forms() {
        let c = cond("budget", ConditionOperator::Equals, json!("5000"));
        assert!(evaluate_condition(&c, &json!({"budget": 5000})).matched);

        let c = cond("budget", ConditionOperator::Equals, json!(5000));
        assert!(evaluate_condition(&c, &json!({"budget": "5000"})).matched);
    }

    #[test]
    fn test_starts_with() {
        let c = cond("source", ConditionOperator::StartsWith, json!("api"));
        assert!(evaluate_condition(&c, &json!({"source": "api-v2"})).matched);
        assert!(!evaluate_condition(&c, &json!({"source": "web"})).matched);
    }

    #[test]
    fn test_missing_field_never_matches() {
        let c = cond("source", ConditionOperator::Contains, json!(""));
        let outcome = evaluate_condition(&c, &json!({}));
        assert!(!outcome.matched);
        assert_eq!(outcome.details, "Check source (missing) contains  -> false");
    }

    #[test]
    fn test_details_format() {
        let c = cond("stage", ConditionOperator::Equals, json!("WON"));
        let outcome = evaluate_condition(&c, &json!({"stage": "WON"}));
        assert_eq!(outcome.details, "Check stage (WON) equals WON -> true");
    }
}
