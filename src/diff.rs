//! Diff suppression predicates and hashing helpers
//!
//! Predicates have the [`DiffSuppressFn`](crate::schema::DiffSuppressFn)
//! shape `(key, old, new, data) -> bool`; returning `true` hides the change
//! from the plan.

use crate::resource_data::ResourceData;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static JSON_OBJECT_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\{").unwrap());

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

pub fn suppress_equivalent_type_string_boolean(_k: &str, old: &str, new: &str, _d: &ResourceData) -> bool {
    matches!((old, new), ("false", "0") | ("true", "1"))
}

/// Both sides parse as JSON and are structurally equal
pub fn suppress_equivalent_json_diffs(_k: &str, old: &str, new: &str, _d: &ResourceData) -> bool {
    json_bytes_equal(old.as_bytes(), new.as_bytes())
}

/// An optional block being removed (`#` going from 1 to 0)
pub fn suppress_missing_optional_configuration_block(
    _k: &str,
    old: &str,
    new: &str,
    _d: &ResourceData,
) -> bool {
    old == "1" && new == "0"
}

pub fn diff_suppress_when_not_creating(_k: &str, _old: &str, _new: &str, d: &ResourceData) -> bool {
    !d.id().is_empty()
}

pub fn diff_suppress_when_new(_k: &str, _old: &str, _new: &str, d: &ResourceData) -> bool {
    d.is_new_resource()
}

pub fn diff_suppress_when_existing(_k: &str, _old: &str, _new: &str, d: &ResourceData) -> bool {
    !d.is_new_resource()
}

pub fn diff_suppress_func_ignore(_k: &str, _old: &str, _new: &str, _d: &ResourceData) -> bool {
    true
}

pub fn diff_ignore_if_already_set(_k: &str, old: &str, _new: &str, _d: &ResourceData) -> bool {
    !old.is_empty()
}

/// The stored value is the hash of the configured one
pub fn diff_ignore_if_same_hash(_k: &str, old: &str, new: &str, _d: &ResourceData) -> bool {
    !old.is_empty() && old == hash_for_data(new)
}

pub fn diff_ignore_if_case_sensitive(k: &str, _old: &str, _new: &str, d: &ResourceData) -> bool {
    let (old, new) = d.get_change(k);
    equal_fold(old.as_str().unwrap_or_default(), new.as_str().unwrap_or_default())
}

fn single_char(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    let c = mapped.next()?;
    mapped.next().is_none().then_some(c)
}

/// Equality under simple (one-to-one) case folding
///
/// Characters whose case mapping expands to several characters only
/// match themselves, so "ß" never equals "ss".
pub fn equal_fold(a: &str, b: &str) -> bool {
    let fold_eq = |x: char, y: char| {
        x == y
            || matches!(
                (single_char(x.to_lowercase()), single_char(y.to_lowercase())),
                (Some(lx), Some(ly)) if lx == ly
            )
            || matches!(
                (single_char(x.to_uppercase()), single_char(y.to_uppercase())),
                (Some(ux), Some(uy)) if ux == uy
            )
    };
    a.chars().count() == b.chars().count() && a.chars().zip(b.chars()).all(|(x, y)| fold_eq(x, y))
}

fn sorted_key_values(list: &[Value]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = list
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let key = entry.get("key")?.as_str()?;
            let value = entry.get("value")?.as_str()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

/// A `key`/`value` list whose entries only changed order
pub fn diff_suppress_list_key_value_ordering(k: &str, _old: &str, _new: &str, d: &ResourceData) -> bool {
    let attribute = k.split('.').next().unwrap_or(k);
    let (old, new) = d.get_change(attribute);
    match (old.as_array(), new.as_array()) {
        (Some(old), Some(new)) => sorted_key_values(old) == sorted_key_values(new),
        _ => false,
    }
}

/// FNV-1a 32-bit hash rendered as `"<decimal>=="`
pub fn hash_for_data(s: &str) -> String {
    let hash = s
        .bytes()
        .fold(FNV32_OFFSET_BASIS, |h, b| (h ^ u32::from(b)).wrapping_mul(FNV32_PRIME));
    format!("{}==", hash)
}

/// CRC32 (IEEE) of `s`
pub fn string_hash(s: &str) -> i64 {
    i64::from(crc32fast::hash(s.as_bytes()))
}

pub fn json_bytes_equal(b1: &[u8], b2: &[u8]) -> bool {
    match (
        serde_json::from_slice::<Value>(b1),
        serde_json::from_slice::<Value>(b2),
    ) {
        (Ok(o1), Ok(o2)) => o1 == o2,
        _ => false,
    }
}

pub fn is_base64_encoded(data: &[u8]) -> bool {
    STANDARD.decode(data).is_ok()
}

/// Standard base64, leaving already-encoded input untouched
pub fn base64_encode(data: &[u8]) -> String {
    if is_base64_encoded(data) {
        return String::from_utf8_lossy(data).into_owned();
    }
    STANDARD.encode(data)
}

pub fn looks_like_json_string(s: &str) -> bool {
    JSON_OBJECT_START.is_match(s)
}

/// Entries to create and to remove when moving from `old` to `new`
///
/// A key whose value changed appears in both sets.
pub fn diff_string_maps(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let as_string = |v: &Value| v.as_str().unwrap_or_default().to_string();

    let mut create: BTreeMap<String, String> = new.iter().map(|(k, v)| (k.clone(), as_string(v))).collect();
    let mut remove = BTreeMap::new();
    for (k, v) in old {
        let v = as_string(v);
        match create.get(k) {
            Some(current) if *current == v => {
                create.remove(k);
            }
            _ => {
                remove.insert(k.clone(), v);
            }
        }
    }
    (create, remove)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_with(state: Value, config: Value) -> ResourceData {
        ResourceData::default()
            .with_state(state.as_object().cloned().unwrap())
            .with_config(config.as_object().cloned().unwrap())
    }

    #[test]
    fn test_string_boolean() {
        let d = ResourceData::default();
        assert!(suppress_equivalent_type_string_boolean("k", "false", "0", &d));
        assert!(suppress_equivalent_type_string_boolean("k", "true", "1", &d));
        assert!(!suppress_equivalent_type_string_boolean("k", "true", "0", &d));
    }

    #[test]
    fn test_equivalent_json() {
        let d = ResourceData::default();
        assert!(suppress_equivalent_json_diffs("k", r#"{"a": 1, "b": [2]}"#, r#"{"b":[2],"a":1}"#, &d));
        assert!(!suppress_equivalent_json_diffs("k", r#"{"a": 1}"#, r#"{"a": 2}"#, &d));
        assert!(!suppress_equivalent_json_diffs("k", "{", "{", &d));
    }

    #[test]
    fn test_lifecycle_predicates() {
        let existing = ResourceData::default().with_id("x");
        let fresh = ResourceData::default().new_resource();
        assert!(diff_suppress_when_not_creating("k", "", "", &existing));
        assert!(!diff_suppress_when_not_creating("k", "", "", &fresh));
        assert!(diff_suppress_when_new("k", "", "", &fresh));
        assert!(diff_suppress_when_existing("k", "", "", &existing));
        assert!(diff_suppress_func_ignore("k", "a", "b", &fresh));
        assert!(diff_ignore_if_already_set("k", "a", "b", &fresh));
        assert!(!diff_ignore_if_already_set("k", "", "b", &fresh));
    }

    #[test]
    fn test_hash_for_data_known_values() {
        assert_eq!(hash_for_data(""), "2166136261==");
        assert_eq!(hash_for_data("a"), "3826002220==");
    }

    #[test]
    fn test_same_hash() {
        let d = ResourceData::default();
        let stored = hash_for_data("secret");
        assert!(diff_ignore_if_same_hash("k", &stored, "secret", &d));
        assert!(!diff_ignore_if_same_hash("k", "", "secret", &d));
        assert!(!diff_ignore_if_same_hash("k", &stored, "other", &d));
    }

    #[test]
    fn test_case_insensitive() {
        let d = data_with(json!({"mode": "Bursting"}), json!({"mode": "bursting"}));
        assert!(diff_ignore_if_case_sensitive("mode", "", "", &d));
    }

    #[test]
    fn test_case_insensitive_uses_simple_folding() {
        let d = data_with(json!({"name": "STRASSE"}), json!({"name": "straße"}));
        assert!(!diff_ignore_if_case_sensitive("name", "", "", &d));

        let d = data_with(json!({"name": "ẞ"}), json!({"name": "ß"}));
        assert!(diff_ignore_if_case_sensitive("name", "", "", &d));

        assert!(equal_fold("\u{212A}elvin", "kelvin"));
        assert!(equal_fold("ſ", "S"));
        assert!(!equal_fold("İ", "i"));
        assert!(!equal_fold("ab", "abc"));
    }

    #[test]
    fn test_key_value_ordering() {
        let d = data_with(
            json!({"tag": [{"key": "a", "value": "1"}, {"key": "b", "value": "2"}]}),
            json!({"tag": [{"key": "b", "value": "2"}, {"key": "a", "value": "1"}]}),
        );
        assert!(diff_suppress_list_key_value_ordering("tag.0.key", "", "", &d));

        let changed = data_with(
            json!({"tag": [{"key": "a", "value": "1"}]}),
            json!({"tag": [{"key": "a", "value": "2"}]}),
        );
        assert!(!diff_suppress_list_key_value_ordering("tag.0.value", "", "", &changed));
    }

    #[test]
    fn test_base64_encode_is_idempotent() {
        let once = base64_encode(b"hello world");
        assert_eq!(once, "aGVsbG8gd29ybGQ=");
        assert_eq!(base64_encode(once.as_bytes()), once);
    }

    #[test]
    fn test_looks_like_json() {
        assert!(looks_like_json_string("  {\"a\":1}"));
        assert!(!looks_like_json_string("[1]"));
    }

    #[test]
    fn test_string_hash_is_crc32() {
        assert_eq!(string_hash("123456789"), 0xCBF4_3926);
        assert_eq!(string_hash(""), 0);
    }

    #[test]
    fn test_diff_string_maps() {
        let old = json!({"keep": "1", "change": "a", "drop": "x"}).as_object().cloned().unwrap();
        let new = json!({"keep": "1", "change": "b", "add": "y"}).as_object().cloned().unwrap();
        let (create, remove) = diff_string_maps(&old, &new);
        assert_eq!(create.keys().collect::<Vec<_>>(), vec!["add", "change"]);
        assert_eq!(remove.keys().collect::<Vec<_>>(), vec!["change", "drop"]);
    }
}
