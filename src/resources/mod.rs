//! Managed resources
//!
//! One module per Terraform resource type. Each declares its schema, the
//! expand/flatten conversions between [`ResourceData`](crate::resource_data::ResourceData)
//! and the API object, and the CRUD callbacks of [`Resource`](crate::resource::Resource).

pub mod aws_efs_file_system;
pub mod aws_sqs_queue;
pub mod gcp_storage_bucket;
pub mod k8_config_map;
pub mod s3_bucket;
pub mod tenant;
pub mod tenant_secret;
