//! Request-scoped ambient state shared by handlers, interceptors and activators.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::PortalError;

/// Key/value bag threaded through every dispatch by `&mut`.
///
/// One instance per logical request. Nothing expires on its own: callers
/// `clear()` it between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmbientContext {
    entries: HashMap<String, Value>,
}

impl AmbientContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Result<&Value, PortalError> {
        self.entries
            .get(key)
            .ok_or_else(|| PortalError::KeyNotFound(key.to_string()))
    }

    /// Like [`get`](Self::get) for string values; non-strings are rendered as JSON.
    pub fn get_string(&self, key: &str) -> Result<String, PortalError> {
        self.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_write_wins() {
        let mut ctx = AmbientContext::new();
        ctx.set("k", "first");
        let previous = ctx.set("k", "second");
        assert_eq!(previous, Some(json!("first")));
        assert_eq!(ctx.get("k").unwrap(), &json!("second"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn missing_key_is_an_error_not_a_default() {
        let ctx = AmbientContext::new();
        match ctx.get("absent") {
            Err(PortalError::KeyNotFound(key)) => assert_eq!(key, "absent"),
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }

    #[test]
    fn clear_removes_every_key() {
        let mut ctx = AmbientContext::new();
        ctx.set("a", 1);
        ctx.set("b", true);
        ctx.clear();
        assert!(ctx.is_empty());
        assert!(!ctx.contains("a"));
        assert!(ctx.get("b").is_err());
    }

    #[test]
    fn get_string_renders_non_strings() {
        let mut ctx = AmbientContext::new();
        ctx.set("name", "abc");
        ctx.set("count", 3);
        assert_eq!(ctx.get_string("name").unwrap(), "abc");
        assert_eq!(ctx.get_string("count").unwrap(), "3");
    }
}
