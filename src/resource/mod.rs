//! Resource abstraction layer
//!
//! Every managed resource implements [`Resource`] and every data source
//! implements [`DataSource`]. Implementations are looked up by their
//! Terraform type name through the [`registry`].
//!
//! # Architecture
//!
//! - [`registry`] - Builds and caches the name -> implementation maps
//!
//! # Example
//!
//! ```ignore
//! use duplocloud_provider::resource::get_resource;
//!
//! let tenant = get_resource("duplocloud_tenant").unwrap();
//! println!("{}", tenant.schema().to_json());
//! ```

mod registry;

use crate::diag::DiagResult;
use crate::duplosdk::DuploClient;
use crate::resource_data::ResourceData;
use crate::schema::ResourceSchema;
use crate::wait::Context;
use async_trait::async_trait;

pub use registry::*;

/// A managed resource: schema plus CRUD callbacks
///
/// Callbacks read planned values from `d` and write the flattened remote
/// object back into it. Clearing the id in `read` removes the resource from
/// state.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Terraform type name, e.g. `duplocloud_tenant`
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()>;

    async fn read(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()>;

    /// Resources whose attributes all force replacement never see an update;
    /// for them this just refreshes state.
    async fn update(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        self.read(ctx, d, client).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()>;

    /// Prepare `d` (whose id is the import id) for the read that follows
    async fn import(&self, _ctx: &Context, _d: &mut ResourceData, _client: &DuploClient) -> DiagResult<()> {
        Ok(())
    }
}

/// A read-only data source
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()>;
}

/// Split a `<tenant>/<part>/...` resource id into exactly `n` parts
pub(crate) fn parse_id<'a>(id: &'a str, n: usize, kind: &str) -> DiagResult<Vec<&'a str>> {
    let parts: Vec<&str> = id.splitn(n, '/').collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return crate::diag_errorf!("{}: invalid resource ID: {}", kind, id);
    }
    Ok(parts)
}
