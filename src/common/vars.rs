//! Loosely-typed variable map used for session context and node metadata.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// An ordered string-keyed map of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<V: Serialize>(
        mut self,
        key: &str,
        value: V,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Insert a value, replacing any previous one. Values that fail to serialize are stored as null.
    pub fn set<V: Serialize>(
        &mut self,
        key: &str,
        value: V,
    ) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.inner.insert(key.to_string(), value);
    }

    /// Get a value converted to `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Get a string value, if the key holds one.
    pub fn get_str(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str)
    }

    /// Resolve a dotted path such as `order.items.0.name`.
    pub fn lookup(
        &self,
        path: &str,
    ) -> Option<&Value> {
        let mut keys = path.split('.');
        let mut current = self.inner.get(keys.next()?)?;
        for key in keys {
            current = match current {
                Value::Object(obj) => obj.get(key)?,
                Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<Value> {
        self.inner.remove(key)
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.inner.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }
}

impl From<Value> for Vars {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(inner) => Self {
                inner,
            },
            _ => Self::default(),
        }
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(inner: Map<String, Value>) -> Self {
        Self {
            inner,
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_vars_set_and_get() {
        let vars = Vars::new().with("name", "Alice").with("age", 42);
        assert_eq!(vars.get::<String>("name"), Some("Alice".to_string()));
        assert_eq!(vars.get::<u32>("age"), Some(42));
        assert_eq!(vars.get::<u32>("name"), None);
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_vars_lookup_nested_path() {
        let vars: Vars = json!({"order": {"items": [{"sku": "A1"}, {"sku": "B2"}]}}).into();
        assert_eq!(vars.lookup("order.items.1.sku"), Some(&json!("B2")));
        assert_eq!(vars.lookup("order.missing"), None);
        assert_eq!(vars.lookup("order.items.x"), None);
    }

    #[test]
    fn test_vars_from_non_object_is_empty() {
        let vars: Vars = json!([1, 2, 3]).into();
        assert!(vars.is_empty());
    }
}
