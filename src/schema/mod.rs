//! Declarative resource schemas
//!
//! A [`ResourceSchema`] describes the attributes of one resource or data
//! source: their types, which are user-settable, which force replacement,
//! defaults, validators and diff suppression. The provider uses it to
//! validate configuration, fill defaults and plan changes.

pub mod fragments;

use crate::diag::{Diagnostic, Diagnostics};
use crate::resource_data::ResourceData;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub use fragments::*;

/// Field validator; returns one message per problem found
pub type Validator = Arc<dyn Fn(&Value, &str) -> Vec<String> + Send + Sync>;

/// Diff suppression predicate: `(key, old, new, data) -> suppress`
pub type DiffSuppressFn = fn(&str, &str, &str, &ResourceData) -> bool;

/// Default operation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    List,
    Set,
    Map,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::List => "list",
            ValueType::Set => "set",
            ValueType::Map => "map",
        }
    }

    /// The value an unset attribute of this type reads as
    pub fn zero_value(&self) -> Value {
        match self {
            ValueType::String => Value::String(String::new()),
            ValueType::Int => json!(0),
            ValueType::Float => json!(0.0),
            ValueType::Bool => Value::Bool(false),
            ValueType::List | ValueType::Set => Value::Array(Vec::new()),
            ValueType::Map => Value::Object(Map::new()),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Float => value.is_number(),
            ValueType::Bool => value.is_boolean(),
            ValueType::List | ValueType::Set => value.is_array(),
            ValueType::Map => value.is_object(),
        }
    }
}

/// Element of a collection attribute
#[derive(Clone)]
pub enum Elem {
    /// Collection of primitives
    Type(ValueType),
    /// Collection of nested blocks
    Block(BTreeMap<String, Schema>),
}

/// Schema of a single attribute
#[derive(Clone)]
pub struct Schema {
    pub value_type: ValueType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub max_items: usize,
    pub min_items: usize,
    pub elem: Option<Elem>,
    pub validate: Vec<Validator>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub deprecated: Option<String>,
    pub exactly_one_of: Vec<String>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("value_type", &self.value_type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .finish_non_exhaustive()
    }
}

impl Schema {
    fn of(value_type: ValueType) -> Self {
        Self {
            value_type,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            max_items: 0,
            min_items: 0,
            elem: None,
            validate: Vec::new(),
            diff_suppress: None,
            deprecated: None,
            exactly_one_of: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::of(ValueType::String)
    }

    pub fn int() -> Self {
        Self::of(ValueType::Int)
    }

    pub fn float() -> Self {
        Self::of(ValueType::Float)
    }

    pub fn bool() -> Self {
        Self::of(ValueType::Bool)
    }

    pub fn list(elem: Elem) -> Self {
        Self {
            elem: Some(elem),
            ..Self::of(ValueType::List)
        }
    }

    pub fn set(elem: Elem) -> Self {
        Self {
            elem: Some(elem),
            ..Self::of(ValueType::Set)
        }
    }

    /// Map of primitives, `string` unless stated otherwise
    pub fn map(elem_type: ValueType) -> Self {
        Self {
            elem: Some(Elem::Type(elem_type)),
            ..Self::of(ValueType::Map)
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = n;
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = n;
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate.push(validator);
        self
    }

    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn exactly_one_of(mut self, keys: &[&str]) -> Self {
        self.exactly_one_of = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// A read-only copy: computed, with every user-facing constraint removed
    pub fn into_computed(mut self) -> Self {
        self.computed = true;
        self.required = false;
        self.optional = false;
        self.force_new = false;
        self.max_items = 0;
        self.min_items = 0;
        self.default = None;
        self.validate.clear();
        self.diff_suppress = None;
        self.exactly_one_of.clear();
        if let Some(Elem::Block(fields)) = self.elem.take() {
            self.elem = Some(Elem::Block(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_computed()))
                    .collect(),
            ));
        }
        self
    }

    /// Nested block fields, if this is a block collection
    pub fn block(&self) -> Option<&BTreeMap<String, Schema>> {
        match &self.elem {
            Some(Elem::Block(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Whether the attribute may appear in configuration
    pub fn is_configurable(&self) -> bool {
        self.required || self.optional
    }

    /// Description with the default value and deprecation notice appended
    pub fn full_description(&self) -> String {
        let mut description = self.description.clone();
        if let Some(default) = &self.default {
            let rendered = match default {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&format!("Defaults to `{}`.", rendered));
        }
        if let Some(deprecated) = &self.deprecated {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(deprecated);
        }
        description
    }

    /// JSON rendering used by the `schema` command
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.value_type.as_str()));
        let description = self.full_description();
        if !description.is_empty() {
            out.insert("description".into(), json!(description));
        }
        for (flag, set) in [
            ("required", self.required),
            ("optional", self.optional),
            ("computed", self.computed),
            ("force_new", self.force_new),
            ("sensitive", self.sensitive),
        ] {
            if set {
                out.insert(flag.into(), json!(true));
            }
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if self.max_items > 0 {
            out.insert("max_items".into(), json!(self.max_items));
        }
        if self.min_items > 0 {
            out.insert("min_items".into(), json!(self.min_items));
        }
        if !self.exactly_one_of.is_empty() {
            out.insert("exactly_one_of".into(), json!(self.exactly_one_of));
        }
        match &self.elem {
            Some(Elem::Type(t)) => {
                out.insert("elem".into(), json!({ "type": t.as_str() }));
            }
            Some(Elem::Block(fields)) => {
                out.insert("block".into(), fields_to_json(fields));
            }
            None => {}
        }
        Value::Object(out)
    }
}

fn fields_to_json(fields: &BTreeMap<String, Schema>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// CRUD operations, used to select a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn get(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    pub fn create(mut self, d: Duration) -> Self {
        self.create = d;
        self
    }

    pub fn update(mut self, d: Duration) -> Self {
        self.update = d;
        self
    }

    pub fn delete(mut self, d: Duration) -> Self {
        self.delete = d;
        self
    }
}

/// Schema of a whole resource or data source
#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    pub description: String,
    pub fields: BTreeMap<String, Schema>,
    pub timeouts: Timeouts,
    pub importable: bool,
    pub deprecation_message: Option<String>,
}

impl ResourceSchema {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: &str, schema: Schema) -> Self {
        self.fields.insert(name.to_string(), schema);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn importable(mut self) -> Self {
        self.importable = true;
        self
    }

    pub fn deprecation_message(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.fields.get(name)
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("description".into(), json!(self.description));
        out.insert("attributes".into(), fields_to_json(&self.fields));
        if let Some(message) = &self.deprecation_message {
            out.insert("deprecation_message".into(), json!(message));
        }
        Value::Object(out)
    }
}

fn is_present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Check a configuration object against a schema
pub fn validate_config(fields: &BTreeMap<String, Schema>, config: &Map<String, Value>) -> Diagnostics {
    let mut diags = Diagnostics::new();
    validate_block(fields, config, "", &mut diags);
    diags
}

fn validate_block(
    fields: &BTreeMap<String, Schema>,
    config: &Map<String, Value>,
    prefix: &str,
    diags: &mut Diagnostics,
) {
    for key in config.keys() {
        if !fields.contains_key(key) {
            diags.push(
                Diagnostic::error(format!("An argument named \"{}\" is not expected here.", key))
                    .with_attribute(join_path(prefix, key)),
            );
        }
    }

    let mut checked_groups = BTreeSet::new();
    for (key, schema) in fields {
        let path = join_path(prefix, key);
        let value = config.get(key);

        if !schema.exactly_one_of.is_empty() && checked_groups.insert(schema.exactly_one_of.join(",")) {
            let set: Vec<&String> = schema
                .exactly_one_of
                .iter()
                .filter(|k| is_present(config.get(k.as_str())))
                .collect();
            let group = schema.exactly_one_of.join(",");
            if set.is_empty() {
                diags.push(
                    Diagnostic::error(format!("\"{}\": one of `{}` must be specified", key, group))
                        .with_attribute(path.clone()),
                );
            } else if set.len() > 1 {
                let names: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
                diags.push(
                    Diagnostic::error(format!(
                        "\"{}\": only one of `{}` can be specified, but `{}` were specified.",
                        key,
                        group,
                        names.join(",")
                    ))
                    .with_attribute(path.clone()),
                );
            }
        }

        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if schema.required {
                    diags.push(
                        Diagnostic::error(format!(
                            "The argument \"{}\" is required, but no definition was found.",
                            key
                        ))
                        .with_attribute(path),
                    );
                }
                continue;
            }
        };

        if !schema.is_configurable() {
            diags.push(
                Diagnostic::error(format!("\"{}\": this field cannot be set", key)).with_attribute(path),
            );
            continue;
        }

        if let Some(message) = &schema.deprecated {
            diags.push(Diagnostic::warning(message.clone()).with_attribute(path.clone()));
        }

        validate_value(schema, value, &path, key, diags);
    }
}

fn validate_value(schema: &Schema, value: &Value, path: &str, key: &str, diags: &mut Diagnostics) {
    if !schema.value_type.matches(value) {
        diags.push(
            Diagnostic::error(format!(
                "Inappropriate value for attribute \"{}\": {} required.",
                key,
                schema.value_type.as_str()
            ))
            .with_attribute(path),
        );
        return;
    }

    if let Value::Array(items) = value {
        if schema.max_items > 0 && items.len() > schema.max_items {
            diags.push(
                Diagnostic::error(format!(
                    "Too many {} blocks: No more than {} \"{}\" blocks are allowed",
                    key, schema.max_items, key
                ))
                .with_attribute(path),
            );
        }
        if schema.min_items > 0 && items.len() < schema.min_items {
            diags.push(
                Diagnostic::error(format!(
                    "Insufficient {} blocks: At least {} \"{}\" blocks are required.",
                    key, schema.min_items, key
                ))
                .with_attribute(path),
            );
        }
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}.{}", path, i);
            match &schema.elem {
                Some(Elem::Block(fields)) => match item {
                    Value::Object(obj) => validate_block(fields, obj, &item_path, diags),
                    _ => diags.push(
                        Diagnostic::error(format!("Inappropriate value for block \"{}\": object required.", key))
                            .with_attribute(item_path),
                    ),
                },
                Some(Elem::Type(t)) if !t.matches(item) => diags.push(
                    Diagnostic::error(format!(
                        "Inappropriate value for attribute \"{}\": list of {} required.",
                        key,
                        t.as_str()
                    ))
                    .with_attribute(item_path),
                ),
                _ => {}
            }
        }
    }

    if let (Value::Object(entries), Some(Elem::Type(t))) = (value, &schema.elem) {
        for (k, v) in entries {
            if !t.matches(v) {
                diags.push(
                    Diagnostic::error(format!(
                        "Inappropriate value for attribute \"{}\": map of {} required.",
                        key,
                        t.as_str()
                    ))
                    .with_attribute(format!("{}.{}", path, k)),
                );
            }
        }
    }

    for validator in &schema.validate {
        for message in validator(value, key) {
            diags.push(Diagnostic::error(message).with_attribute(path));
        }
    }
}

/// Fill schema defaults for absent optional attributes, recursing into blocks
pub fn apply_defaults(fields: &BTreeMap<String, Schema>, config: &mut Map<String, Value>) {
    for (key, schema) in fields {
        match config.get_mut(key) {
            Some(Value::Array(items)) => {
                if let Some(Elem::Block(nested)) = &schema.elem {
                    for item in items.iter_mut() {
                        if let Value::Object(obj) = item {
                            apply_defaults(nested, obj);
                        }
                    }
                }
            }
            Some(value) if !value.is_null() => {}
            _ => {
                if let Some(default) = &schema.default {
                    config.insert(key.clone(), default.clone());
                }
            }
        }
    }
}
