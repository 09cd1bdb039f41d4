//! Per-call resource data
//!
//! [`ResourceData`] carries the id, the prior state and the planned values of
//! one resource instance through a CRUD callback. Callbacks read the planned
//! values, write flattened remote values back with [`ResourceData::set`], and
//! the provider turns the result into the new state.
//!
//! # Module Structure
//!
//! - [`helpers`] - Expand/flatten helpers shared by resources

pub mod helpers;

use crate::schema::{Operation, Timeouts};
use serde_json::{Map, Value};
use std::time::Duration;

pub use helpers::*;

#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    state: Map<String, Value>,
    values: Map<String, Value>,
    is_new: bool,
    timeouts: Timeouts,
}

/// Whether a value counts as unset: null or the zero value of its type
pub fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
    }
}

fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

impl ResourceData {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            ..Default::default()
        }
    }

    /// Prior state; also the starting point of the current values
    pub fn with_state(mut self, state: Map<String, Value>) -> Self {
        if let Some(Value::String(id)) = state.get("id") {
            self.id = id.clone();
        }
        self.values = state.clone();
        self.values.remove("id");
        self.state = state;
        self.state.remove("id");
        self
    }

    /// Overlay configuration on the current values; computed attributes
    /// absent from the configuration keep their prior value
    ///
    /// A configured `id` (data source lookups) becomes the id.
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        for (k, v) in config {
            if k == "id" {
                if let Value::String(id) = v {
                    self.id = id;
                }
                continue;
            }
            self.values.insert(k, v);
        }
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn new_resource(mut self) -> Self {
        self.is_new = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty id removes the resource from state
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_new_resource(&self) -> bool {
        self.is_new
    }

    pub fn mark_new_resource(&mut self) {
        self.is_new = true;
    }

    /// Current value at a dotted path (`policy.0.method`), `Null` when unset
    pub fn get(&self, key: &str) -> Value {
        lookup(&self.values, key).cloned().unwrap_or(Value::Null)
    }

    /// Current value, unless it is unset or the zero value of its type
    pub fn get_ok(&self, key: &str) -> Option<Value> {
        lookup(&self.values, key)
            .filter(|v| !is_zero_value(v))
            .cloned()
    }

    pub fn get_string(&self, key: &str) -> String {
        match lookup(&self.values, key) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn get_int(&self, key: &str) -> i64 {
        lookup(&self.values, key).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn get_float(&self, key: &str) -> f64 {
        lookup(&self.values, key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        lookup(&self.values, key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_list(&self, key: &str) -> Vec<Value> {
        match lookup(&self.values, key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn get_map(&self, key: &str) -> Map<String, Value> {
        match lookup(&self.values, key) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Write a top-level attribute
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// `(prior, current)` values of an attribute
    pub fn get_change(&self, key: &str) -> (Value, Value) {
        (
            lookup(&self.state, key).cloned().unwrap_or(Value::Null),
            self.get(key),
        )
    }

    /// Whether the current value differs from the prior state; unset and
    /// zero values compare equal
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        if is_zero_value(&old) && is_zero_value(&new) {
            return false;
        }
        old != new
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    pub fn timeout(&self, op: Operation) -> Duration {
        self.timeouts.get(op)
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// The new state, `None` once the id was cleared
    pub fn into_state(self) -> Option<Map<String, Value>> {
        if self.id.is_empty() {
            return None;
        }
        let mut state = self.values;
        state.insert("id".to_string(), Value::String(self.id));
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_state_id_is_split_out() {
        let d = ResourceData::default().with_state(obj(json!({"id": "t/x", "name": "x"})));
        assert_eq!(d.id(), "t/x");
        assert_eq!(d.get("id"), Value::Null);
        assert_eq!(d.get_string("name"), "x");
    }

    #[test]
    fn test_get_ok_treats_zero_as_unset() {
        let d = ResourceData::default().with_config(obj(json!({"a": "", "b": 0, "c": false, "d": "x"})));
        assert!(d.get_ok("a").is_none());
        assert!(d.get_ok("b").is_none());
        assert!(d.get_ok("c").is_none());
        assert_eq!(d.get_ok("d"), Some(json!("x")));
        assert!(d.get_ok("missing").is_none());
    }

    #[test]
    fn test_dotted_paths() {
        let d = ResourceData::default().with_config(obj(json!({"policy": [{"method": "Sse"}]})));
        assert_eq!(d.get_string("policy.0.method"), "Sse");
        assert_eq!(d.get("policy.1.method"), Value::Null);
    }

    #[test]
    fn test_has_change_compares_against_prior_state() {
        let d = ResourceData::default()
            .with_state(obj(json!({"id": "1", "size": 1, "arn": "a"})))
            .with_config(obj(json!({"size": 2})));
        assert!(d.has_change("size"));
        assert!(!d.has_change("arn"));
        assert!(d.has_changes(&["arn", "size"]));
        assert_eq!(d.get_change("size"), (json!(1), json!(2)));
    }

    #[test]
    fn test_unset_and_empty_are_not_a_change() {
        let d = ResourceData::default().with_config(obj(json!({"tags": {}})));
        assert!(!d.has_change("tags"));
    }

    #[test]
    fn test_into_state() {
        let mut d = ResourceData::default().with_config(obj(json!({"name": "q"})));
        assert!(d.clone().into_state().is_none());
        d.set_id("t/q");
        d.set("arn", "arn:aws:sqs:q");
        let state = d.into_state().unwrap();
        assert_eq!(state["id"], json!("t/q"));
        assert_eq!(state["arn"], json!("arn:aws:sqs:q"));
    }
}
