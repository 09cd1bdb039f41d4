//! DuploCloud provider
//!
//! Schemas, CRUD callbacks and polling helpers for DuploCloud managed
//! resources, plus the REST client they run against.
//!
//! # Module Structure
//!
//! - [`duplosdk`] - DuploCloud REST API client
//! - [`provider`] - Host entry points (configure, plan, apply, read, import)
//! - [`resource`] - `Resource`/`DataSource` traits and the type registry
//! - [`resources`] / [`data_sources`] - One module per Terraform type
//! - [`schema`], [`validation`], [`diff`] - Declarative schema model
//! - [`resource_data`] - Per-call attribute bag and expand/flatten helpers
//! - [`wait`] - Context, state polling and retries
//! - [`diag`] - Diagnostics
//! - [`config`] - Persisted fallback settings

/// Version injected at compile time via DUPLOCLOUD_PROVIDER_VERSION (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DUPLOCLOUD_PROVIDER_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub mod config;
pub mod data_sources;
pub mod diag;
pub mod diff;
pub mod duplosdk;
pub mod provider;
pub mod resource;
pub mod resource_data;
pub mod resources;
pub mod schema;
pub mod validation;
pub mod wait;
