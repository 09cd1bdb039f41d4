//! Attribute validators
//!
//! Every constructor returns a [`Validator`]: a closure receiving the
//! attribute value and key and returning one message per problem. A value of
//! the wrong JSON type yields an "expected type" message.

use crate::schema::Validator;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

static DNS_SUBDOMAIN_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9.-]*$").unwrap());
static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());
static QUALIFIED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").unwrap());
static DATE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2})?$").unwrap());

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const LABEL_VALUE_MAX_LENGTH: usize = 63;
const DNS_SUBDOMAIN_MAX_LENGTH: usize = 253;

fn validator<F>(f: F) -> Validator
where
    F: Fn(&Value, &str) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn with_str(value: &Value, key: &str, check: impl FnOnce(&str) -> Vec<String>) -> Vec<String> {
    match value.as_str() {
        Some(s) => check(s),
        None => vec![format!("expected type of {} to be string", key)],
    }
}

fn with_int(value: &Value, key: &str, check: impl FnOnce(i64) -> Vec<String>) -> Vec<String> {
    match value.as_i64() {
        Some(i) => check(i),
        None => vec![format!("expected type of {} to be integer", key)],
    }
}

fn with_map(value: &Value, key: &str, check: impl FnOnce(&serde_json::Map<String, Value>) -> Vec<String>) -> Vec<String> {
    match value.as_object() {
        Some(m) => check(m),
        None => vec![format!("expected type of {} to be map", key)],
    }
}

/// Run every validator and collect all messages
pub fn all(validators: Vec<Validator>) -> Validator {
    validator(move |v, k| validators.iter().flat_map(|f| f(v, k)).collect())
}

pub fn is_uuid() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| match uuid::Uuid::parse_str(s) {
            Ok(_) => vec![],
            Err(_) => vec![format!("expected {} to be a valid UUID, got {}", k, s)],
        })
    })
}

pub fn int_between(min: i64, max: i64) -> Validator {
    validator(move |v, k| {
        with_int(v, k, |i| {
            if i < min || i > max {
                vec![format!("expected {} to be in the range ({} - {}), got {}", k, min, max, i)]
            } else {
                vec![]
            }
        })
    })
}

pub fn int_at_least(min: i64) -> Validator {
    validator(move |v, k| {
        with_int(v, k, |i| {
            if i < min {
                vec![format!("expected {} to be at least ({}), got {}", k, min, i)]
            } else {
                vec![]
            }
        })
    })
}

pub fn string_in_slice(valid: &[&str], ignore_case: bool) -> Validator {
    let valid: Vec<String> = valid.iter().map(|s| s.to_string()).collect();
    validator(move |v, k| {
        with_str(v, k, |s| {
            let found = valid.iter().any(|candidate| {
                if ignore_case {
                    candidate.eq_ignore_ascii_case(s)
                } else {
                    candidate == s
                }
            });
            if found {
                vec![]
            } else {
                vec![format!("expected {} to be one of {:?}, got {}", k, valid, s)]
            }
        })
    })
}

pub fn string_len_between(min: usize, max: usize) -> Validator {
    validator(move |v, k| {
        with_str(v, k, |s| {
            let len = s.chars().count();
            if len < min || len > max {
                vec![format!(
                    "expected length of {} to be in the range ({} - {}), got {}",
                    k, min, max, s
                )]
            } else {
                vec![]
            }
        })
    })
}

pub fn string_is_not_empty() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            if s.is_empty() {
                vec![format!("expected {} not to be an empty string, got {}", k, s)]
            } else {
                vec![]
            }
        })
    })
}

pub fn string_match(pattern: &Regex, message: &str) -> Validator {
    let pattern = pattern.clone();
    let message = message.to_string();
    validator(move |v, k| {
        with_str(v, k, |s| {
            if pattern.is_match(s) {
                vec![]
            } else if message.is_empty() {
                vec![format!("invalid value for {} (should match {})", k, pattern)]
            } else {
                vec![format!("invalid value for {} ({})", k, message)]
            }
        })
    })
}

pub fn string_is_json() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| match serde_json::from_str::<Value>(s) {
            Ok(_) => vec![],
            Err(e) => vec![format!("{:?} contains an invalid JSON: {}", k, e)],
        })
    })
}

/// A JSON document whose top level is an object
pub fn validate_json_string() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            if !s.starts_with('{') {
                return vec![format!("{:?} contains invalid JSON", k)];
            }
            match serde_json::from_str::<Value>(s) {
                Ok(_) => vec![],
                Err(e) => vec![format!("{:?} contains an invalid JSON: {}", k, e)],
            }
        })
    })
}

/// A JSON document whose top level is an array of objects
pub fn validate_json_object_array() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            match serde_json::from_str::<Vec<serde_json::Map<String, Value>>>(s) {
                Ok(_) => vec![],
                Err(e) => vec![format!("{} is invalid: {}", k, e)],
            }
        })
    })
}

/// Kubernetes object name (RFC 1123 DNS subdomain)
pub fn dns_subdomain_rfc1123() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            let mut errors = Vec::new();
            let len = s.chars().count();
            if !(1..=DNS_SUBDOMAIN_MAX_LENGTH).contains(&len) {
                errors.push(format!(
                    "expected length of {} to be in the range (1 - {}), got {}",
                    k, DNS_SUBDOMAIN_MAX_LENGTH, s
                ));
            }
            let valid_edges = s.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                && s.chars().last().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
            if !DNS_SUBDOMAIN_CHARS.is_match(s) || !valid_edges {
                errors.push(format!("invalid value for {} (Invalid Kubernetes configmap name)", k));
            }
            if s.to_lowercase().contains("..") {
                errors.push(format!("expected {} to not be any of [..], got {}", k, s));
            }
            errors
        })
    })
}

/// Kubernetes DNS label (RFC 1123)
pub fn dns_label() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            let mut errors = Vec::new();
            if s.len() > QUALIFIED_NAME_MAX_LENGTH {
                errors.push(format!("{} must be no more than 63 characters", k));
            }
            if !DNS_LABEL.is_match(s) {
                errors.push(format!(
                    "{} a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character",
                    k
                ));
            }
            errors
        })
    })
}

fn qualified_name_errors(name: &str) -> Vec<String> {
    let (prefix, local) = match name.split_once('/') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    };
    let mut errors = Vec::new();
    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > DNS_SUBDOMAIN_MAX_LENGTH || !DNS_SUBDOMAIN_CHARS.is_match(prefix) {
            errors.push("prefix part must be a lowercase RFC 1123 subdomain".to_string());
        }
    }
    if local.is_empty() {
        errors.push("name part must be non-empty".to_string());
    } else {
        if local.len() > QUALIFIED_NAME_MAX_LENGTH {
            errors.push("name part must be no more than 63 characters".to_string());
        }
        if !QUALIFIED_NAME.is_match(local) {
            errors.push(
                "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
                    .to_string(),
            );
        }
    }
    errors
}

fn label_value_errors(value: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if value.len() > LABEL_VALUE_MAX_LENGTH {
        errors.push("must be no more than 63 characters".to_string());
    }
    if !value.is_empty() && !QUALIFIED_NAME.is_match(value) {
        errors.push(
            "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
                .to_string(),
        );
    }
    errors
}

/// Kubernetes label map: qualified-name keys, label-value values
pub fn validate_labels() -> Validator {
    validator(|v, k| {
        with_map(v, k, |m| {
            let mut errors = Vec::new();
            for (name, value) in m {
                for msg in qualified_name_errors(name) {
                    errors.push(format!("{} ({:?}) {}", k, name, msg));
                }
                let Some(value) = value.as_str() else {
                    errors.push(format!("{}.{} ({}): Expected value to be string", k, name, value));
                    return errors;
                };
                for msg in label_value_errors(value) {
                    errors.push(format!("{} ({:?}) {}", k, value, msg));
                }
            }
            errors
        })
    })
}

/// Kubernetes annotation map: keys must be qualified names
pub fn validate_annotations() -> Validator {
    validator(|v, k| {
        with_map(v, k, |m| {
            m.keys()
                .flat_map(|name| {
                    qualified_name_errors(&name.to_lowercase())
                        .into_iter()
                        .map(move |msg| format!("{} ({:?}) {}", k, name, msg))
                })
                .collect()
        })
    })
}

pub fn non_negative_integer() -> Validator {
    validator(|v, k| {
        with_int(v, k, |i| {
            if i < 0 {
                vec![format!("{} must be greater than or equal to 0", k)]
            } else {
                vec![]
            }
        })
    })
}

pub fn positive_integer() -> Validator {
    validator(|v, k| {
        with_int(v, k, |i| {
            if i <= 0 {
                vec![format!("{} must be greater than 0", k)]
            } else {
                vec![]
            }
        })
    })
}

pub fn port_number() -> Validator {
    validator(|v, k| {
        with_int(v, k, |i| {
            if (1..=65535).contains(&i) {
                vec![]
            } else {
                vec![format!("{} must be between 1 and 65535, inclusive", k)]
            }
        })
    })
}

/// A string that is empty or parses as an integer
pub fn validate_type_string_nullable_int() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            if s.is_empty() {
                return vec![];
            }
            match s.parse::<i64>() {
                Ok(_) => vec![],
                Err(e) => vec![format!("{}: cannot parse '{}' as int: {}", k, s, e)],
            }
        })
    })
}

/// Octal file mode between `0` and `0777`
pub fn validate_mode_bits() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            let mut errors = Vec::new();
            if !s.starts_with('0') {
                errors.push(format!("{}: value {} should start with '0' (octal numeral)", k, s));
            }
            match i64::from_str_radix(s, 8) {
                Ok(mode) if !(0..=0o777).contains(&mode) => errors.push(format!(
                    "{} ({:#o}) expects octal notation (a value between 0 and 0777)",
                    k, mode
                )),
                Ok(_) => {}
                Err(e) => errors.push(format!("{} :Cannot parse octal numeral ({:?}): {}", k, s, e)),
            }
            errors
        })
    })
}

pub fn attribute_value_does_not_contain(search: &str) -> Validator {
    let search = search.to_string();
    validator(move |v, k| {
        with_str(v, k, |s| {
            if s.contains(&search) {
                vec![format!("{:?} must not contain {:?}", k, search)]
            } else {
                vec![]
            }
        })
    })
}

pub fn attribute_value_is_in(valid: &[&str]) -> Validator {
    let valid: Vec<String> = valid.iter().map(|s| s.to_string()).collect();
    validator(move |v, k| {
        with_str(v, k, |s| {
            if valid.iter().any(|candidate| candidate == s) {
                vec![]
            } else {
                vec![format!("{:?} must contain a value from {:?}, got {:?}", k, valid, s)]
            }
        })
    })
}

/// `YYYY-MM-DDTHH:MM` with optional seconds, naming a real calendar time
pub fn validate_date_time_format() -> Validator {
    validator(|v, k| {
        with_str(v, k, |s| {
            let parses = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
                .iter()
                .any(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).is_ok());
            if DATE_TIME.is_match(s) && parses {
                vec![]
            } else {
                vec![format!(
                    "Invalid datetime format: {}, expected format: YYYY-MM-DDTHH:MM:SS",
                    s
                )]
            }
        })
    })
}

/// Whether `input` is at most `max_length` bytes long
pub fn string_length_at_most(input: &str, max_length: usize) -> bool {
    input.len() <= max_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(v: &Validator, value: Value) -> Vec<String> {
        v(&value, "field")
    }

    #[test]
    fn test_is_uuid() {
        let v = is_uuid();
        assert!(check(&v, json!("3b0e4b8a-8a57-4b4a-9c36-2f1d0c5d6e7f")).is_empty());
        assert_eq!(check(&v, json!("nope")).len(), 1);
        assert_eq!(check(&v, json!(5)), vec!["expected type of field to be string"]);
    }

    #[test]
    fn test_int_between() {
        let v = int_between(60, 1_209_600);
        assert!(check(&v, json!(60)).is_empty());
        assert_eq!(
            check(&v, json!(59)),
            vec!["expected field to be in the range (60 - 1209600), got 59"]
        );
    }

    #[test]
    fn test_string_in_slice_case() {
        assert!(check(&string_in_slice(&["queue"], false), json!("queue")).is_empty());
        assert_eq!(check(&string_in_slice(&["queue"], false), json!("Queue")).len(), 1);
        assert!(check(&string_in_slice(&["queue"], true), json!("Queue")).is_empty());
    }

    #[test]
    fn test_validate_json_string_requires_object() {
        let v = validate_json_string();
        assert!(check(&v, json!(r#"{"a":1}"#)).is_empty());
        assert_eq!(check(&v, json!("[1]")), vec![r#""field" contains invalid JSON"#]);
        assert_eq!(check(&v, json!("{bad")).len(), 1);
    }

    #[test]
    fn test_json_object_array() {
        let v = validate_json_object_array();
        assert!(check(&v, json!(r#"[{"a":1}]"#)).is_empty());
        assert_eq!(check(&v, json!("[1]")).len(), 1);
    }

    #[test]
    fn test_dns_subdomain() {
        let v = dns_subdomain_rfc1123();
        assert!(check(&v, json!("app-config.v1")).is_empty());
        assert!(!check(&v, json!("App")).is_empty());
        assert!(!check(&v, json!("-app")).is_empty());
        assert!(!check(&v, json!("a..b")).is_empty());
        assert!(!check(&v, json!("")).is_empty());
    }

    #[test]
    fn test_dns_label() {
        assert!(check(&dns_label(), json!("web-1")).is_empty());
        assert!(!check(&dns_label(), json!("web.1")).is_empty());
    }

    #[test]
    fn test_labels_and_annotations() {
        assert!(check(&validate_labels(), json!({"app.kubernetes.io/name": "web"})).is_empty());
        assert!(!check(&validate_labels(), json!({"bad key!": "web"})).is_empty());
        assert!(!check(&validate_labels(), json!({"app": 1})).is_empty());
        assert!(check(&validate_annotations(), json!({"Example.com/Owner": "x"})).is_empty());
    }

    #[test]
    fn test_integer_validators() {
        assert!(check(&non_negative_integer(), json!(0)).is_empty());
        assert!(!check(&positive_integer(), json!(0)).is_empty());
        assert!(check(&port_number(), json!(443)).is_empty());
        assert!(!check(&port_number(), json!(70000)).is_empty());
    }

    #[test]
    fn test_nullable_int() {
        let v = validate_type_string_nullable_int();
        assert!(check(&v, json!("")).is_empty());
        assert!(check(&v, json!("42")).is_empty());
        assert!(!check(&v, json!("4x")).is_empty());
    }

    #[test]
    fn test_mode_bits() {
        let v = validate_mode_bits();
        assert!(check(&v, json!("0644")).is_empty());
        assert!(!check(&v, json!("644")).is_empty());
        assert!(!check(&v, json!("01777")).is_empty());
        assert!(!check(&v, json!("09")).is_empty());
    }

    #[test]
    fn test_attribute_value_helpers() {
        assert!(!check(&attribute_value_does_not_contain("google"), json!("my-google")).is_empty());
        assert!(check(&attribute_value_is_in(&["a", "b"]), json!("b")).is_empty());
        assert!(!check(&attribute_value_is_in(&["a", "b"]), json!("c")).is_empty());
    }

    #[test]
    fn test_date_time_format() {
        let v = validate_date_time_format();
        assert!(check(&v, json!("2024-01-02T03:04")).is_empty());
        assert!(check(&v, json!("2024-01-02T03:04:05")).is_empty());
        assert!(!check(&v, json!("2024-01-02 03:04")).is_empty());
        assert!(!check(&v, json!("2024-02-30T03:04")).is_empty());
    }

    #[test]
    fn test_string_length_at_most() {
        assert!(string_length_at_most("abc", 3));
        assert!(!string_length_at_most("abcd", 3));
    }

    #[test]
    fn test_all_collects_every_message() {
        let v = all(vec![string_is_not_empty(), string_len_between(1, 5)]);
        assert_eq!(check(&v, json!("")).len(), 2);
    }
}
