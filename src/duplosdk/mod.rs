//! DuploCloud REST API client
//!
//! # Module Structure
//!
//! - [`client`] - Main client; request building, decoding and logging
//! - [`http`] - Transport setup (auth headers, TLS, timeouts)
//! - [`error`] - [`ClientError`] and its classification helpers
//! - [`retry`] - Rate-limit and exponential-backoff retries
//! - [`names`] - "Fullname" conventions for tenant-scoped resources
//! - One module per endpoint group (tenants, secrets, S3, SQS, EFS, GCP
//!   buckets, k8s config maps)
//!
//! # Example
//!
//! ```ignore
//! use duplocloud_provider::duplosdk::DuploClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = DuploClient::new("https://acme.duplocloud.net", "token")?;
//!     let tenants = client.list_tenants_for_user().await?;
//!     Ok(())
//! }
//! ```

pub mod aws_cloud_resource;
pub mod aws_efs;
pub mod aws_sqs;
pub mod client;
pub mod error;
pub mod gcp_storage;
pub mod http;
pub mod k8s_config_map;
pub mod names;
pub mod retry;
pub mod tenant;
pub mod tenant_secret;
pub mod types;

pub use client::DuploClient;
pub use error::{ClientError, ClientResult};
pub use http::HttpOptions;
pub use retry::RetryConf;
