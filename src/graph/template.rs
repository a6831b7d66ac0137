use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::{
    FlowError, Result,
    common::Vars,
    graph::{INPUT_VARIABLE, value_to_text},
};

/// Context variable placeholder.
/// Format: `{{name}}` or `{{order.items.0.sku}}`
static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*\}\}").expect("valid placeholder pattern"));

/// What placeholders and conditions resolve against during one step.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub context: &'a Vars,
    pub input: &'a str,
}

impl<'a> Scope<'a> {
    pub fn new(
        context: &'a Vars,
        input: &'a str,
    ) -> Self {
        Self {
            context,
            input,
        }
    }

    /// `input` is the turn's text unless the context shadows it.
    pub fn lookup(
        &self,
        path: &str,
    ) -> Option<Value> {
        if let Some(value) = self.context.lookup(path) {
            return Some(value.clone());
        }
        if path == INPUT_VARIABLE {
            return Some(Value::String(self.input.to_string()));
        }
        None
    }
}

/// Substitute placeholders, leaving unknown ones empty.
pub fn render(
    template: &str,
    scope: &Scope<'_>,
) -> String {
    VARIABLE_PATTERN
        .replace_all(template, |caps: &Captures<'_>| scope.lookup(&caps[1]).as_ref().and_then(value_to_text).unwrap_or_default())
        .into_owned()
}

/// Substitute placeholders. Returns error if any placeholder cannot be resolved.
pub fn resolve_template(
    template: &str,
    scope: &Scope<'_>,
) -> Result<String> {
    let mut errors: Vec<String> = Vec::new();
    let result = VARIABLE_PATTERN.replace_all(template, |caps: &Captures<'_>| match scope.lookup(&caps[1]).as_ref().and_then(value_to_text) {
        Some(value) => value,
        None => {
            errors.push(format!("variable '{}' not found", &caps[1]));
            String::new()
        }
    });

    if !errors.is_empty() {
        return Err(FlowError::Configuration(errors.join(", ")));
    }

    Ok(result.into_owned())
}

/// Resolve placeholders in a JSON value recursively.
///
/// A string that is exactly one placeholder keeps the referenced value's JSON type.
pub fn resolve_json_value(
    value: &Value,
    scope: &Scope<'_>,
) -> Result<Value> {
    match value {
        Value::String(s) => {
            if let Some(caps) = VARIABLE_PATTERN.captures(s)
                && caps[0].len() == s.len()
            {
                return scope.lookup(&caps[1]).ok_or_else(|| FlowError::Configuration(format!("variable '{}' not found", &caps[1])));
            }
            Ok(Value::String(resolve_template(s, scope)?))
        }
        Value::Array(arr) => {
            let resolved: Result<Vec<Value>> = arr.iter().map(|v| resolve_json_value(v, scope)).collect();
            Ok(Value::Array(resolved?))
        }
        Value::Object(obj) => {
            let resolved: Result<serde_json::Map<String, Value>> = obj.iter().map(|(k, v)| resolve_json_value(v, scope).map(|rv| (k.clone(), rv))).collect();
            Ok(Value::Object(resolved?))
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn create_test_context() -> Vars {
        Vars::new().with("name", "Alice").with("order", json!({"id": 42, "items": ["tea", "cake"]}))
    }

    #[test]
    fn test_render_no_variables() {
        let ctx = create_test_context();
        assert_eq!(render("hello world", &Scope::new(&ctx, "")), "hello world");
    }

    #[test]
    fn test_render_context_and_input() {
        let ctx = create_test_context();
        let scope = Scope::new(&ctx, "hi there");
        assert_eq!(render("Hi {{name}}, order {{ order.id }}: {{order.items.1}}", &scope), "Hi Alice, order 42: cake");
        assert_eq!(render("You said: {{input}}", &scope), "You said: hi there");
    }

    #[test]
    fn test_render_missing_is_empty() {
        let ctx = Vars::new();
        assert_eq!(render("Hi {{name}}!", &Scope::new(&ctx, "")), "Hi !");
    }

    #[test]
    fn test_resolve_template_missing_errors() {
        let ctx = create_test_context();
        let err = resolve_template("{{name}} {{missing}}", &Scope::new(&ctx, "")).unwrap_err();
        assert_eq!(err, FlowError::Configuration("variable 'missing' not found".into()));
    }

    #[test]
    fn test_resolve_json_value_keeps_types() {
        let ctx = create_test_context();
        let scope = Scope::new(&ctx, "q");
        let body = json!({"order": "{{order.id}}", "label": "order-{{order.id}}", "items": ["{{order.items}}"], "n": 1});
        let resolved = resolve_json_value(&body, &scope).unwrap();
        assert_eq!(resolved, json!({"order": 42, "label": "order-42", "items": [["tea", "cake"]], "n": 1}));
    }
}
