//! Resource Registry - name -> implementation lookup
//!
//! Built once on first access and shared for the life of the process.

use super::{DataSource, Resource};
use crate::{data_sources, resources};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub struct Registry {
    pub resources: BTreeMap<&'static str, Box<dyn Resource>>,
    pub data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
}

/// Global registry
static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn build_registry() -> Registry {
    let resources: Vec<Box<dyn Resource>> = vec![
        Box::new(resources::tenant::TenantResource),
        Box::new(resources::tenant_secret::TenantSecretResource),
        Box::new(resources::aws_sqs_queue::AwsSqsQueueResource),
        Box::new(resources::aws_efs_file_system::AwsEfsFileSystemResource),
        Box::new(resources::s3_bucket::S3BucketResource),
        Box::new(resources::gcp_storage_bucket::GcpStorageBucketResource),
        Box::new(resources::k8_config_map::K8ConfigMapResource),
    ];
    let data_sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(data_sources::tenant::TenantDataSource),
        Box::new(data_sources::tenant::TenantsDataSource),
        Box::new(data_sources::tenant_secret::TenantSecretDataSource),
        Box::new(data_sources::tenant_secret::TenantSecretsDataSource),
        Box::new(data_sources::aws_sqs_queue::AwsSqsQueueDataSource),
        Box::new(data_sources::k8_config_map::K8ConfigMapDataSource),
        Box::new(data_sources::k8_config_map::K8ConfigMapsDataSource),
    ];

    Registry {
        resources: resources.into_iter().map(|r| (r.name(), r)).collect(),
        data_sources: data_sources.into_iter().map(|d| (d.name(), d)).collect(),
    }
}

/// Get the registry (built on first access)
pub fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(build_registry)
}

/// Get a resource implementation by type name
pub fn get_resource(name: &str) -> Option<&'static dyn Resource> {
    get_registry().resources.get(name).map(|r| r.as_ref())
}

/// Get a data source implementation by type name
pub fn get_data_source(name: &str) -> Option<&'static dyn DataSource> {
    get_registry().data_sources.get(name).map(|d| d.as_ref())
}

/// All resource type names, sorted
pub fn get_all_resource_names() -> Vec<&'static str> {
    get_registry().resources.keys().copied().collect()
}

/// All data source type names, sorted
pub fn get_all_data_source_names() -> Vec<&'static str> {
    get_registry().data_sources.keys().copied().collect()
}
