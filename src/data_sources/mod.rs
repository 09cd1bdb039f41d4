//! Data sources
//!
//! Read-only lookups of remote objects. Each one reuses the schema and
//! flatten helpers of the matching resource where the shapes agree.
//!
//! # Module Structure
//!
//! - [`tenant`] - `duplocloud_tenant`, `duplocloud_tenants`
//! - [`tenant_secret`] - `duplocloud_tenant_secret`, `duplocloud_tenant_secrets`
//! - [`aws_sqs_queue`] - `duplocloud_aws_sqs_queue`
//! - [`k8_config_map`] - `duplocloud_k8_config_map`, `duplocloud_k8_config_maps`

pub mod aws_sqs_queue;
pub mod k8_config_map;
pub mod tenant;
pub mod tenant_secret;

use crate::schema::{Elem, Schema};

/// Nested block built from `(name, schema)` pairs
pub(crate) fn block(fields: Vec<(&'static str, Schema)>) -> Elem {
    Elem::Block(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// A list whose elements repeat a data source's own fields, all read-only
pub(crate) fn computed_list_of(fields: Vec<(&'static str, Schema)>) -> Schema {
    let fields = fields
        .into_iter()
        .map(|(k, v)| (k, v.into_computed()))
        .collect();
    Schema::list(block(fields)).computed()
}
