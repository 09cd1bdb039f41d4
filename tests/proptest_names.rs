//! Property-based tests using proptest
//!
//! These tests check the naming conventions, diff suppression predicates
//! and validators against randomized inputs.

use duplocloud_provider::diff::{
    base64_encode, diff_string_maps, diff_suppress_list_key_value_ordering, hash_for_data,
    is_base64_encoded, json_bytes_equal,
};
use duplocloud_provider::duplosdk::names::{
    decode_slash_in_id_part, encode_slash_in_id_part, unprefix_name, unwrap_name,
};
use duplocloud_provider::resource_data::ResourceData;
use duplocloud_provider::resources::aws_sqs_queue::validate_sqs_name;
use duplocloud_provider::validation;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Generate a tenant account name
fn arb_account() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{1,11}"
}

/// Generate a user-supplied short name, possibly containing dashes
fn arb_short_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,30}[a-z0-9]"
}

/// Generate a key/value list as stored in state
fn arb_key_values() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9]{0,12}", 0..8)
        .prop_map(|m| m.into_iter().collect())
}

fn key_value_list(pairs: &[(String, String)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(k, v)| json!({"key": k, "value": v}))
            .collect(),
    )
}

fn with_change(field: &str, old: Value, new: Value) -> ResourceData {
    let mut state = Map::new();
    state.insert("id".into(), json!("t/x"));
    state.insert(field.into(), old);
    let mut config = Map::new();
    config.insert(field.into(), new);
    ResourceData::default().with_state(state).with_config(config)
}

proptest! {
    /// Stripping the tenant prefix returns the short name
    #[test]
    fn unprefix_recovers_short_name(account in arb_account(), name in arb_short_name()) {
        let prefix = format!("duploservices-{}", account);
        let fullname = format!("{}-{}", prefix, name);
        prop_assert_eq!(unprefix_name(&prefix, &fullname), Some(name));
    }

    /// The account suffix is stripped when present and tolerated when optional
    #[test]
    fn unwrap_handles_account_suffix(
        account in arb_account(),
        name in arb_short_name(),
        account_id in "[0-9]{12}",
    ) {
        let prefix = format!("duploservices-{}", account);
        let with_suffix = format!("{}-{}-{}", prefix, name, account_id);
        let without_suffix = format!("{}-{}", prefix, name);

        prop_assert_eq!(unwrap_name(&prefix, &account_id, &with_suffix, false), Some(name.clone()));
        prop_assert_eq!(unwrap_name(&prefix, &account_id, &without_suffix, true), Some(name));
        prop_assert_eq!(unwrap_name(&prefix, &account_id, &without_suffix, false), None);
    }

    /// Encoded id parts never contain a slash
    #[test]
    fn encoded_id_parts_have_no_slash(part in "[a-z/]{0,20}") {
        let encoded = encode_slash_in_id_part(&part);
        prop_assert!(!encoded.contains('/'));
        prop_assert_eq!(decode_slash_in_id_part(&encoded), part);
    }

    /// Reordering a key/value list is never a change
    #[test]
    fn key_value_reordering_is_suppressed(pairs in arb_key_values()) {
        let mut reversed = pairs.clone();
        reversed.reverse();
        let d = with_change("tags", key_value_list(&pairs), key_value_list(&reversed));
        prop_assert!(diff_suppress_list_key_value_ordering("tags.0.key", "", "", &d));
    }

    /// Changing a value is never suppressed
    #[test]
    fn key_value_edit_is_not_suppressed(pairs in arb_key_values().prop_filter("non-empty", |p| !p.is_empty())) {
        let mut edited = pairs.clone();
        edited[0].1.push('x');
        let d = with_change("tags", key_value_list(&pairs), key_value_list(&edited));
        prop_assert!(!diff_suppress_list_key_value_ordering("tags", "", "", &d));
    }

    /// JSON equivalence ignores formatting and key order
    #[test]
    fn json_equivalence_ignores_formatting(pairs in arb_key_values()) {
        let compact: Map<String, Value> = pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let compact = Value::Object(compact);
        let pretty = serde_json::to_string_pretty(&compact).unwrap();
        prop_assert!(json_bytes_equal(compact.to_string().as_bytes(), pretty.as_bytes()));
    }

    /// Hashes are stable and shaped like `<u32>==`
    #[test]
    fn hash_for_data_is_deterministic(data in ".{0,64}") {
        let hash = hash_for_data(&data);
        prop_assert_eq!(&hash, &hash_for_data(&data));
        prop_assert!(hash.ends_with("=="));
        prop_assert!(hash.trim_end_matches('=').parse::<u32>().is_ok());
    }

    /// Encoding twice is the same as encoding once
    #[test]
    fn base64_encode_is_idempotent(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let once = base64_encode(&data);
        prop_assert!(is_base64_encoded(once.as_bytes()));
        prop_assert_eq!(base64_encode(once.as_bytes()), once);
    }

    /// Unchanged entries are neither created nor removed
    #[test]
    fn diff_string_maps_skips_unchanged(pairs in arb_key_values()) {
        let map: Map<String, Value> = pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let (create, remove) = diff_string_maps(&map, &map);
        prop_assert!(create.is_empty());
        prop_assert!(remove.is_empty());
    }

    /// Queue names fit in 80 characters once decorated
    #[test]
    fn sqs_name_length_limit(account in arb_account(), len in 1usize..80, fifo in any::<bool>()) {
        let name = "q".repeat(len);
        // one leading letter plus up to `rest` more characters
        let mut rest = 80 - (14 + account.len());
        if fifo {
            rest -= 5;
        }
        prop_assert_eq!(validate_sqs_name(&account, &name, fifo).is_ok(), len <= rest + 1);
    }

    /// Integers inside the range pass, outside fail
    #[test]
    fn int_between_bounds(value in -1000i64..1000) {
        let errors = validation::int_between(0, 900)(&json!(value), "delay_seconds");
        prop_assert_eq!(errors.is_empty(), (0..=900).contains(&value));
    }

    /// Valid DNS subdomains are accepted
    #[test]
    fn dns_subdomain_accepts_valid(name in "[a-z0-9]([a-z0-9-]{0,20}[a-z0-9])?(\\.[a-z0-9]{1,10}){0,3}") {
        let errors = validation::dns_subdomain_rfc1123()(&json!(name), "name");
        prop_assert!(errors.is_empty(), "{:?}", errors);
    }

    /// Upper case is never a valid DNS subdomain
    #[test]
    fn dns_subdomain_rejects_upper_case(name in "[A-Z][a-z0-9]{0,10}") {
        let errors = validation::dns_subdomain_rfc1123()(&json!(name), "name");
        prop_assert!(!errors.is_empty());
    }
}
