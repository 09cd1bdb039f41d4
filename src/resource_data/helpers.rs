//! Expand/flatten helpers shared by resources

use super::ResourceData;
use crate::diag::{DiagResult, Diagnostics};
use crate::duplosdk::types::DuploKeyStringValue;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

fn single_block(value: Option<&Value>, key: &str) -> DiagResult<Option<Value>> {
    match value {
        Some(Value::Array(items)) if items.len() == 1 => {
            if items[0].is_null() {
                return Err(Diagnostics::errorf(format!(
                    "at least one field is expected inside {}",
                    key
                )));
            }
            Ok(Some(items[0].clone()))
        }
        _ => Ok(None),
    }
}

/// The single element of an optional `max_items = 1` block
pub fn get_optional_block(d: &ResourceData, key: &str) -> DiagResult<Option<Value>> {
    single_block(d.get_ok(key).as_ref(), key)
}

pub fn get_optional_block_as_map(d: &ResourceData, key: &str) -> DiagResult<Option<Map<String, Value>>> {
    Ok(get_optional_block(d, key)?.and_then(|v| v.as_object().cloned()))
}

/// Same as [`get_optional_block_as_map`], inside an already expanded block
pub fn get_optional_nested_block_as_map(
    m: &Map<String, Value>,
    key: &str,
) -> DiagResult<Option<Map<String, Value>>> {
    Ok(single_block(m.get(key), key)?.and_then(|v| v.as_object().cloned()))
}

fn as_strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// A list-of-strings attribute, `None` when unset or empty
pub fn get_as_string_array(d: &ResourceData, key: &str) -> Option<Vec<String>> {
    d.get_ok(key).map(|v| as_strings(&v))
}

/// A list-of-strings entry of a block, `None` when absent
pub fn get_string_array(m: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    match m.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(as_strings(v)),
    }
}

pub fn key_value_to_state(field: &str, items: &[DuploKeyStringValue]) -> Vec<Value> {
    tracing::trace!("keyValueToState[{}]: {} item(s)", field, items.len());
    items
        .iter()
        .map(|kv| serde_json::json!({ "key": kv.key, "value": kv.value }))
        .collect()
}

fn key_values_from_list(items: &[Value]) -> Vec<DuploKeyStringValue> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|kv| {
            DuploKeyStringValue::new(
                kv.get("key").and_then(Value::as_str).unwrap_or_default(),
                kv.get("value").and_then(Value::as_str).unwrap_or_default(),
            )
        })
        .collect()
}

pub fn key_value_from_state(field: &str, d: &ResourceData) -> Vec<DuploKeyStringValue> {
    match d.get_ok(field) {
        Some(Value::Array(items)) => {
            tracing::trace!("keyValueFromState: found {}", field);
            key_values_from_list(&items)
        }
        _ => Vec::new(),
    }
}

pub fn key_value_from_state_list(field: &str, m: &Map<String, Value>) -> Vec<DuploKeyStringValue> {
    match m.get(field) {
        Some(Value::Array(items)) => key_values_from_list(items),
        _ => Vec::new(),
    }
}

pub fn key_value_to_map(items: &[DuploKeyStringValue]) -> Map<String, Value> {
    items
        .iter()
        .map(|kv| (kv.key.clone(), Value::String(kv.value.clone())))
        .collect()
}

pub fn key_value_from_map(m: &Map<String, Value>) -> Vec<DuploKeyStringValue> {
    m.iter()
        .map(|(k, v)| DuploKeyStringValue::new(k.clone(), v.as_str().unwrap_or_default()))
        .collect()
}

/// Entries whose key is one of `keys`, in their original order
pub fn select_key_values(items: &[DuploKeyStringValue], keys: &[&str]) -> Vec<DuploKeyStringValue> {
    let wanted: HashSet<&str> = keys.iter().copied().collect();
    items
        .iter()
        .filter(|kv| wanted.contains(kv.key.as_str()))
        .cloned()
        .collect()
}

pub fn select_key_values_from_map(
    items: &[DuploKeyStringValue],
    keys: &Map<String, Value>,
) -> Vec<DuploKeyStringValue> {
    items
        .iter()
        .filter(|kv| keys.contains_key(&kv.key))
        .cloned()
        .collect()
}

/// Stable sort of `key`/`value` blocks by key; a missing key sorts as ""
pub fn reorder_key_values(pairs: &mut [Value]) {
    pairs.sort_by(|a, b| {
        let ka = a.get("key").and_then(Value::as_str).unwrap_or_default();
        let kb = b.get("key").and_then(Value::as_str).unwrap_or_default();
        ka.cmp(kb)
    });
}

/// Store `from` JSON-encoded under `field`
pub fn to_json_string_field<T: Serialize + ?Sized>(field: &str, from: &T, to: &mut Map<String, Value>) {
    match serde_json::to_string(from) {
        Ok(encoded) => {
            to.insert(field.to_string(), Value::String(encoded));
        }
        Err(e) => tracing::debug!("toJsonStringField: failed to serialize {} to JSON: {}", field, e),
    }
}

pub fn to_json_string_state<T: Serialize + ?Sized>(field: &str, from: &T, d: &mut ResourceData) {
    match serde_json::to_string(from) {
        Ok(encoded) => d.set(field, encoded),
        Err(e) => tracing::debug!("toJsonStringState: failed to serialize {} to JSON: {}", field, e),
    }
}

/// Rename lower camel-case keys to upper camel-case, never overwriting an
/// existing upper camel-case entry
pub fn make_map_upper_camel_case(m: &mut Map<String, Value>) {
    let lower: Vec<String> = m
        .keys()
        .filter(|k| k.chars().next().is_some_and(char::is_lowercase))
        .cloned()
        .collect();
    for key in lower {
        let Some(value) = m.remove(&key) else {
            continue;
        };
        let mut chars = key.chars();
        let upper: String = chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect())
            .unwrap_or_default();
        m.entry(upper).or_insert(value);
    }
}

/// Drop null, empty-map and empty-list entries
pub fn reduce_nil_or_empty_map_entries(m: &mut Map<String, Value>) {
    m.retain(|_, v| match v {
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    });
}

pub fn is_json_empty_slice(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

pub fn flatten_string_map(m: &BTreeMap<String, String>) -> Map<String, Value> {
    m.iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// A map-of-strings attribute; empty when unset
pub fn expand_as_string_map(field: &str, d: &ResourceData) -> BTreeMap<String, String> {
    d.get_map(field)
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, s)
        })
        .collect()
}

pub fn flatten_string_list(items: &[String]) -> Vec<Value> {
    items.iter().cloned().map(Value::String).collect()
}

pub fn expand_string_list(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
