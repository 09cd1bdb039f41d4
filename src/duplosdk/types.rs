//! Shared DuploCloud wire types

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like a missing field
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Key/value pair as used by tags and settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploKeyStringValue {
    #[serde(default, deserialize_with = "null_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub value: String,
}

impl DuploKeyStringValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Enum-like value wrapped in an object, e.g. `{"Value": "available"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuploStringValue {
    #[serde(rename = "Value", default, deserialize_with = "null_default")]
    pub value: String,
}

impl DuploStringValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Platform feature flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploSystemFeatures {
    #[serde(default)]
    pub is_tags_based_resource_mgmt_enabled: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub s3_bucket_name_prefix: String,
    #[serde(default)]
    pub tenant_name_max_length: usize,
}

/// Infrastructure (plan) configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploInfrastructure {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(default)]
    pub cloud: i32,
    #[serde(default, deserialize_with = "null_default")]
    pub region: String,
    #[serde(default, deserialize_with = "null_default")]
    pub provisioning_status: String,
}

/// Cloud identifiers for [`DuploInfrastructure::cloud`]
pub mod cloud {
    pub const AWS: i32 = 0;
    pub const AZURE: i32 = 2;
    pub const GCP: i32 = 3;
}
