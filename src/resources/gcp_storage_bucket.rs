//! `duplocloud_gcp_storage_bucket`

use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::gcp_storage::DuploGcpStorageBucket;
use crate::duplosdk::DuploClient;
use crate::resource::{parse_id, Resource};
use crate::resource_data::{expand_as_string_map, flatten_string_map, ResourceData};
use crate::schema::{ResourceSchema, Schema, Timeouts, ValueType};
use crate::validation;
use crate::wait::{wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create, Context};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Labels the platform sets on its own
const DUPLO_MANAGED_LABELS: &[&str] = &["duplo-allow-public-access", "duplo-encryption"];

pub struct GcpStorageBucketResource;

fn gcp_storage_bucket_schema() -> ResourceSchema {
    ResourceSchema::new("`duplocloud_gcp_storage_bucket` manages a GCP storage bucket in Duplo.")
        .field(
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the storage bucket will be created in.")
                .required()
                .force_new()
                .validate(validation::is_uuid()),
        )
        .field(
            "name",
            Schema::string()
                .description("The short name of the storage bucket.  Duplo will add a prefix to the name.  You can retrieve the full name from the `fullname` attribute.")
                .required()
                .force_new(),
        )
        .field("fullname", Schema::string().description("The full name of the storage bucket.").computed())
        .field("self_link", Schema::string().description("The SelfLink of the storage bucket.").computed())
        .field(
            "enable_versioning",
            Schema::bool()
                .description("Whether or not versioning is enabled for the storage bucket.")
                .optional()
                .default(false),
        )
        .field(
            "allow_public_access",
            Schema::bool()
                .description("Whether or not public access might be allowed for the storage bucket.")
                .optional()
                .default(false),
        )
        .field(
            "labels",
            Schema::map(ValueType::String)
                .description("The labels assigned to this storage bucket.")
                .optional()
                .computed(),
        )
        .timeouts(
            Timeouts::default()
                .create(Duration::from_secs(3 * 60))
                .update(Duration::from_secs(3 * 60))
                .delete(Duration::from_secs(3 * 60)),
        )
        .importable()
}

fn flatten_gcp_labels(d: &mut ResourceData, labels: &BTreeMap<String, String>) {
    let user_labels: BTreeMap<String, String> = labels
        .iter()
        .filter(|(k, _)| !DUPLO_MANAGED_LABELS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    d.set("labels", flatten_string_map(&user_labels));
}

fn flatten_gcp_storage_bucket(d: &mut ResourceData, tenant_id: &str, name: &str, duplo: &DuploGcpStorageBucket) {
    d.set("tenant_id", tenant_id);
    d.set("name", name);
    d.set("fullname", duplo.name.clone());
    d.set("self_link", duplo.self_link.clone());
    d.set("enable_versioning", duplo.enable_versioning);
    d.set("allow_public_access", duplo.allow_public_access);
    flatten_gcp_labels(d, &duplo.labels);
}

async fn gcp_bucket_full_name(client: &DuploClient, tenant_id: &str, name: &str) -> DiagResult<String> {
    client
        .get_duplo_services_name_with_gcp(tenant_id, name)
        .await
        .map_err(|e| Diagnostics::errorf(format!("Error fetching tenant prefix for {} : {}", tenant_id, e)))
}

#[async_trait]
impl Resource for GcpStorageBucketResource {
    fn name(&self) -> &'static str {
        "duplocloud_gcp_storage_bucket"
    }

    fn schema(&self) -> ResourceSchema {
        gcp_storage_bucket_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let rq = DuploGcpStorageBucket {
            name: d.get_string("name"),
            labels: expand_as_string_map("labels", d),
            enable_versioning: d.get_bool("enable_versioning"),
            allow_public_access: d.get_bool("allow_public_access"),
            ..Default::default()
        };
        tracing::trace!("resourceGcpStorageBucketCreate({}, {}): start", tenant_id, rq.name);

        let rp = client.gcp_storage_bucket_create(&tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Error creating tenant {} storage bucket '{}': {}",
                tenant_id, rq.name, e
            ))
        })?;
        let full_name = if rp.name.is_empty() {
            gcp_bucket_full_name(client, &tenant_id, &rq.name).await?
        } else {
            rp.name.clone()
        };

        let id = format!("{}/{}", tenant_id, rq.name);
        let (tid, full, short) = (tenant_id.as_str(), full_name.as_str(), rq.name.as_str());
        let get = move || client.gcp_storage_bucket_get(tid, full, short);
        wait_for_resource_to_be_present_after_create(ctx, d, "storage bucket", &id, get).await?;
        d.set_id(id);

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceGcpStorageBucketCreate({}, {}): end", tenant_id, rq.name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceGcpStorageBucketRead")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceGcpStorageBucketRead({}, {}): start", tenant_id, name);

        let full_name = gcp_bucket_full_name(client, tenant_id, name).await?;
        let duplo = match client.gcp_storage_bucket_get(tenant_id, &full_name, name).await {
            Ok(Some(duplo)) => duplo,
            Ok(None) => {
                d.set_id("");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return diag_errorf!("Unable to retrieve tenant {} storage bucket '{}': {}", tenant_id, name, e)
            }
        };

        flatten_gcp_storage_bucket(d, tenant_id, name, &duplo);
        tracing::trace!("resourceGcpStorageBucketRead({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn update(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceGcpStorageBucketUpdate")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceGcpStorageBucketUpdate({}, {}): start", tenant_id, name);

        let rq = DuploGcpStorageBucket {
            name: d.get_string("fullname"),
            labels: expand_as_string_map("labels", d),
            enable_versioning: d.get_bool("enable_versioning"),
            allow_public_access: d.get_bool("allow_public_access"),
            ..Default::default()
        };
        let rp = client.gcp_storage_bucket_update(tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Error updating tenant {} storage bucket '{}': {}",
                tenant_id, rq.name, e
            ))
        })?;
        // Some hosts answer an update with an empty body.
        let rp = if rp.name.is_empty() { rq } else { rp };
        flatten_gcp_storage_bucket(d, tenant_id, name, &rp);

        tracing::trace!("resourceGcpStorageBucketUpdate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceGcpStorageBucketDelete")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceGcpStorageBucketDelete({}, {}): start", tenant_id, name);

        let mut full_name = d.get_string("fullname");
        if full_name.is_empty() {
            full_name = gcp_bucket_full_name(client, tenant_id, name).await?;
        }

        match client.gcp_storage_bucket_delete(tenant_id, &full_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return diag_errorf!("Error deleting storage bucket '{}': {}", id, e),
        }

        let full = full_name.as_str();
        let get = move || client.gcp_storage_bucket_get(tenant_id, full, name);
        wait_for_resource_to_be_missing_after_delete(ctx, d, "storage bucket", &id, get).await?;

        tracing::trace!("resourceGcpStorageBucketDelete({}, {}): end", tenant_id, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_drops_duplo_managed_labels() {
        let mut d = ResourceData::default();
        let bucket = DuploGcpStorageBucket {
            name: "duploservices-dev-assets-proj".into(),
            enable_versioning: true,
            labels: [
                ("duplo-encryption".to_string(), "sse".to_string()),
                ("team".to_string(), "web".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        flatten_gcp_storage_bucket(&mut d, "t1", "assets", &bucket);
        assert_eq!(d.get("labels"), json!({"team": "web"}));
        assert!(d.get_bool("enable_versioning"));
        assert_eq!(d.get_string("fullname"), "duploservices-dev-assets-proj");
    }

    #[test]
    fn test_schema_defaults() {
        let schema = gcp_storage_bucket_schema();
        assert_eq!(schema.get("allow_public_access").unwrap().default, Some(json!(false)));
        assert!(schema.get("name").unwrap().force_new);
    }
}
