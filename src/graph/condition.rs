//! Branch conditions evaluated by condition nodes and conditional transitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variable a condition reads when none is named: the current turn's input.
pub const INPUT_VARIABLE: &str = "input";

/// Comparison operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operator {
    #[serde(alias = "eq", alias = "==", alias = "is")]
    Equals,
    #[serde(alias = "ne", alias = "!=", alias = "not-equals", alias = "is_not")]
    NotEquals,
    #[serde(alias = "gt", alias = ">", alias = "greater-than")]
    GreaterThan,
    #[serde(alias = "lt", alias = "<", alias = "less-than")]
    LessThan,
    Contains,
    #[serde(alias = "not-contains")]
    NotContains,
    Exists,
    #[serde(alias = "not-exists")]
    NotExists,
    #[serde(alias = "else", alias = "otherwise")]
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default = "default_variable")]
    pub variable: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_variable() -> String {
    INPUT_VARIABLE.to_string()
}

impl Condition {
    pub fn new(
        operator: Operator,
        value: Option<Value>,
    ) -> Self {
        Self {
            variable: default_variable(),
            operator,
            value,
            case_sensitive: false,
        }
    }

    /// A catch-all condition.
    pub fn default_branch() -> Self {
        Self::new(Operator::Default, None)
    }

    pub fn on(
        mut self,
        variable: &str,
    ) -> Self {
        self.variable = variable.to_string();
        self
    }

    /// Evaluate against the resolved value of `self.variable`.
    pub fn matches(
        &self,
        actual: Option<&Value>,
    ) -> bool {
        match self.operator {
            Operator::Default => true,
            Operator::Exists => is_present(actual),
            Operator::NotExists => !is_present(actual),
            Operator::Equals => self.eval_equals(actual),
            Operator::NotEquals => !self.eval_equals(actual),
            Operator::Contains => self.eval_contains(actual),
            Operator::NotContains => !self.eval_contains(actual),
            Operator::GreaterThan => self.eval_cmp(actual, |a, b| a > b),
            Operator::LessThan => self.eval_cmp(actual, |a, b| a < b),
        }
    }

    fn normalize(
        &self,
        s: &str,
    ) -> String {
        if self.case_sensitive {
            s.trim().to_string()
        } else {
            s.trim().to_lowercase()
        }
    }

    fn expected_text(&self) -> Option<String> {
        self.value.as_ref().and_then(value_to_text).map(|s| self.normalize(&s))
    }

    fn eval_equals(
        &self,
        actual: Option<&Value>,
    ) -> bool {
        let (Some(actual), Some(expected)) = (actual, self.value.as_ref()) else {
            return false;
        };
        if let (Some(a), Some(e)) = (value_to_number(actual), value_to_number(expected)) {
            return a == e;
        }
        match (value_to_text(actual), self.expected_text()) {
            (Some(a), Some(e)) => self.normalize(&a) == e,
            _ => false,
        }
    }

    fn eval_contains(
        &self,
        actual: Option<&Value>,
    ) -> bool {
        let (Some(actual), Some(expected)) = (actual, self.expected_text()) else {
            return false;
        };
        match actual {
            Value::Array(items) => items.iter().filter_map(value_to_text).any(|item| self.normalize(&item) == expected),
            other => value_to_text(other).map(|a| self.normalize(&a).contains(&expected)).unwrap_or(false),
        }
    }

    fn eval_cmp<F>(
        &self,
        actual: Option<&Value>,
        cmp: F,
    ) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        match (actual.and_then(value_to_number), self.value.as_ref().and_then(value_to_number)) {
            (Some(a), Some(e)) => cmp(a, e),
            _ => false,
        }
    }
}

fn is_present(actual: Option<&Value>) -> bool {
    match actual {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(arr)) => !arr.is_empty(),
        Some(Value::Object(obj)) => !obj.is_empty(),
        Some(_) => true,
    }
}

/// Render a scalar as text. Objects and arrays render as JSON; null renders as nothing.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cond(
        operator: Operator,
        value: Value,
    ) -> Condition {
        Condition::new(operator, Some(value))
    }

    #[test]
    fn test_equals_is_case_normalized_by_default() {
        let c = cond(Operator::Equals, json!("YES"));
        assert!(c.matches(Some(&json!("yes"))));
        assert!(c.matches(Some(&json!("  Yes "))));

        let mut strict = c.clone();
        strict.case_sensitive = true;
        assert!(!strict.matches(Some(&json!("yes"))));
        assert!(strict.matches(Some(&json!("YES"))));
    }

    #[test]
    fn test_equals_numeric_coercion() {
        let c = cond(Operator::Equals, json!("10"));
        assert!(c.matches(Some(&json!(10))));
        assert!(c.matches(Some(&json!("10.0"))));
        assert!(!c.matches(None));
        assert!(cond(Operator::NotEquals, json!("10")).matches(None));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(cond(Operator::GreaterThan, json!(5)).matches(Some(&json!("7"))));
        assert!(!cond(Operator::GreaterThan, json!(5)).matches(Some(&json!(5))));
        assert!(cond(Operator::LessThan, json!("5")).matches(Some(&json!(4.5))));
        assert!(!cond(Operator::LessThan, json!(5)).matches(Some(&json!("abc"))));
    }

    #[test]
    fn test_contains_string_and_array() {
        let c = cond(Operator::Contains, json!("Price"));
        assert!(c.matches(Some(&json!("what is the price?"))));
        assert!(!c.matches(Some(&json!("hello"))));
        assert!(c.matches(Some(&json!(["size", "PRICE"]))));
        assert!(cond(Operator::NotContains, json!("price")).matches(Some(&json!("hello"))));
        assert!(cond(Operator::NotContains, json!("price")).matches(None));
    }

    #[test]
    fn test_exists_and_default() {
        assert!(Condition::new(Operator::Exists, None).matches(Some(&json!("x"))));
        assert!(!Condition::new(Operator::Exists, None).matches(Some(&json!("  "))));
        assert!(Condition::new(Operator::NotExists, None).matches(Some(&Value::Null)));
        assert!(Condition::default_branch().matches(None));
    }

    #[test]
    fn test_operator_aliases_deserialize() {
        let c: Condition = serde_json::from_value(json!({"operator": "==", "value": 1})).unwrap();
        assert_eq!(c.operator, Operator::Equals);
        assert_eq!(c.variable, INPUT_VARIABLE);
        let c: Condition = serde_json::from_value(json!({"operator": "not-contains", "variable": "topic"})).unwrap();
        assert_eq!(c.operator, Operator::NotContains);
        assert_eq!(c.variable, "topic");
    }
}
