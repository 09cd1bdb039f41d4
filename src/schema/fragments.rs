//! Reusable schema fragments

use super::{Elem, Schema, ValueType};
use crate::validation;
use std::collections::BTreeMap;

fn block(fields: Vec<(&str, Schema)>) -> Elem {
    Elem::Block(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

/// Nested `key`/`value` pair, both required strings
pub fn key_value_schema() -> Elem {
    block(vec![
        ("key", Schema::string().required()),
        ("value", Schema::string().required()),
    ])
}

/// Set of `name`/`value` filters
pub fn filter_schema() -> Schema {
    Schema::set(block(vec![
        ("name", Schema::string().required()),
        ("value", Schema::string().required()),
    ]))
    .optional()
}

/// Set of `name`/`values` filters
pub fn filters_schema() -> Schema {
    Schema::set(block(vec![
        ("name", Schema::string().required()),
        ("values", Schema::list(Elem::Type(ValueType::String)).required()),
    ]))
    .optional()
}

pub fn tags_schema() -> Schema {
    Schema::map(ValueType::String).optional()
}

pub fn tags_schema_force_new() -> Schema {
    Schema::map(ValueType::String).optional().force_new()
}

pub fn tags_schema_computed() -> Schema {
    Schema::map(ValueType::String).computed()
}

/// Read-only list of AWS tags
pub fn aws_tags_key_value_schema_computed() -> Schema {
    Schema::list(key_value_schema()).computed()
}

/// User-settable list of AWS tags
pub fn aws_tags_key_value_schema() -> Schema {
    Schema::list(block(vec![
        (
            "key",
            Schema::string()
                .required()
                .validate(validation::string_len_between(1, 128)),
        ),
        (
            "value",
            Schema::string()
                .required()
                .validate(validation::string_len_between(0, 256)),
        ),
    ]))
    .optional()
    .max_items(50)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_fields_required() {
        match key_value_schema() {
            Elem::Block(fields) => {
                assert!(fields["key"].required);
                assert!(fields["value"].required);
            }
            Elem::Type(_) => panic!("expected a block"),
        }
    }

    #[test]
    fn test_tags_variants() {
        assert!(tags_schema().optional);
        assert!(tags_schema_force_new().force_new);
        assert!(tags_schema_computed().computed && !tags_schema_computed().optional);
    }

    #[test]
    fn test_filters_schema_values_is_list() {
        let schema = filters_schema();
        let fields = schema.block().unwrap();
        assert_eq!(fields["values"].value_type, ValueType::List);
    }
}
