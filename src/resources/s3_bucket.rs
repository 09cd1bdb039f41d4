//! `duplocloud_s3_bucket`
//!
//! Uses the v3 bucket API and falls back to the legacy cloud resource API
//! when the v3 endpoints are missing on the Duplo host.

use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::aws_cloud_resource::{DuploS3Bucket, DuploS3BucketRequest, DuploS3BucketSettingsRequest};
use crate::duplosdk::types::DuploSystemFeatures;
use crate::duplosdk::DuploClient;
use crate::resource::{parse_id, Resource};
use crate::resource_data::{get_as_string_array, get_optional_block_as_map, key_value_to_state, ResourceData};
use crate::schema::{aws_tags_key_value_schema_computed, Elem, ResourceSchema, Schema, Timeouts, ValueType};
use crate::validation;
use crate::wait::{self, wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create, Context};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

static S3_BUCKET_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9._-]*$").unwrap());

/// `duploservices-<12 chars>-` plus `-<12 digit account>`
const MAX_DUPLOSERVICES_AND_SUFFIX_LENGTH: usize = "duploservices-1234567890ab--1234567890ab".len();
const S3_BUCKET_NAME_MAX_LENGTH: usize = 63;
const DELETE_SETTLE_TIME: Duration = Duration::from_secs(10);

pub struct S3BucketResource;

fn default_encryption_schema() -> Schema {
    Schema::list(Elem::Block(
        [(
            "method".to_string(),
            Schema::string()
                .description("Default encryption method.  Must be one of: `None`, `Sse`, `AwsKms`, `TenantKms`.")
                .optional()
                .default("Sse")
                .validate(validation::string_in_slice(&["None", "Sse", "AwsKms", "TenantKms"], false)),
        )]
        .into_iter()
        .collect(),
    ))
    .description("Default encryption settings for objects uploaded to the bucket.")
    .optional()
    .computed()
    .max_items(1)
}

fn s3_bucket_schema() -> ResourceSchema {
    ResourceSchema::new("`duplocloud_s3_bucket` manages an s3 bucket in Duplo.")
        .field(
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the S3 bucket will be created in.")
                .required()
                .force_new()
                .validate(validation::is_uuid()),
        )
        .field(
            "name",
            Schema::string()
                .description("The short name of the S3 bucket.  Duplo will add a prefix to the name.  You can retrieve the full name from the `fullname` attribute.")
                .required()
                .force_new()
                .validate(validation::string_match(&S3_BUCKET_NAME, "Invalid S3 bucket name")),
        )
        .field("fullname", Schema::string().description("The full name of the S3 bucket.").computed())
        .field("arn", Schema::string().description("The ARN of the S3 bucket.").computed())
        .field("domain_name", Schema::string().description("The domain name of the S3 bucket.").computed())
        .field(
            "enable_versioning",
            Schema::bool()
                .description("Whether or not to enable versioning.")
                .optional()
                .computed(),
        )
        .field(
            "enable_access_logs",
            Schema::bool()
                .description("Whether or not to enable access logs.  When enabled, Duplo will send access logs to a centralized S3 bucket per plan.")
                .optional()
                .computed(),
        )
        .field(
            "allow_public_access",
            Schema::bool()
                .description("Whether or not to remove the public access block from the bucket.")
                .optional()
                .computed(),
        )
        .field("default_encryption", default_encryption_schema())
        .field(
            "region",
            Schema::string()
                .description("The region of the S3 bucket.")
                .optional()
                .computed(),
        )
        .field(
            "managed_policies",
            Schema::list(Elem::Type(ValueType::String))
                .description(
                    "Duplo can manage your S3 bucket policy for you, based on simple list of policy keywords:\n\n \
                     - `\"ssl\"`: Require SSL / HTTPS when accessing the bucket.\n \
                     - `\"ignore\"`: If this value is present, Duplo will not manage your bucket policy.\n",
                )
                .optional()
                .computed(),
        )
        .field("tags", aws_tags_key_value_schema_computed().description("Tags applied to the bucket."))
        .timeouts(
            Timeouts::default()
                .create(Duration::from_secs(5 * 60))
                .delete(Duration::from_secs(2 * 60)),
        )
        .importable()
}

/// Longest short name the platform can still decorate into a valid bucket name
fn s3_max_name_length(features: Option<&DuploSystemFeatures>) -> usize {
    match features {
        Some(f) if f.is_tags_based_resource_mgmt_enabled => S3_BUCKET_NAME_MAX_LENGTH,
        _ => S3_BUCKET_NAME_MAX_LENGTH - MAX_DUPLOSERVICES_AND_SUFFIX_LENGTH,
    }
}

async fn s3_bucket_full_name(
    client: &DuploClient,
    features: Option<&DuploSystemFeatures>,
    tenant_id: &str,
    name: &str,
) -> DiagResult<String> {
    if let Some(f) = features.filter(|f| f.is_tags_based_resource_mgmt_enabled) {
        return Ok(format!("{}{}", f.s3_bucket_name_prefix, name));
    }
    client
        .get_duplo_services_name_with_aws(tenant_id, name)
        .await
        .map_err(|e| {
            Diagnostics::errorf(format!(
                "Unable to retrieve duplo service name (tenant: {}, bucket: {}: error: {})",
                tenant_id, name, e
            ))
        })
}

fn fill_s3_bucket_request(rq: &mut DuploS3BucketSettingsRequest, d: &ResourceData) -> DiagResult<()> {
    rq.enable_versioning = d.get_bool("enable_versioning");
    rq.enable_access_logs = d.get_bool("enable_access_logs");
    rq.allow_public_access = d.get_bool("allow_public_access");

    if let Some(encryption) = get_optional_block_as_map(d, "default_encryption")? {
        if let Some(method) = encryption.get("method").and_then(Value::as_str) {
            rq.default_encryption = method.to_string();
        }
    }
    rq.region = d.get_string("region");
    if let Some(policies) = get_as_string_array(d, "managed_policies") {
        rq.policies = policies;
    }
    Ok(())
}

fn flatten_s3_bucket(d: &mut ResourceData, tenant_id: &str, name: &str, duplo: &DuploS3Bucket) {
    d.set("tenant_id", tenant_id);
    d.set("name", name);
    d.set("fullname", duplo.name.clone());
    d.set("domain_name", duplo.domain_name.clone());
    d.set("arn", duplo.arn.clone());
    d.set("enable_versioning", duplo.enable_versioning);
    d.set("enable_access_logs", duplo.enable_access_logs);
    d.set("allow_public_access", duplo.allow_public_access);
    d.set("default_encryption", json!([{ "method": duplo.default_encryption }]));
    d.set("managed_policies", duplo.policies.clone());
    d.set("tags", key_value_to_state("tags", &duplo.tags));
    d.set("region", duplo.region.clone());
}

impl S3BucketResource {
    async fn create_legacy(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceS3BucketCreateOldApi({}, {}): start", tenant_id, name);

        let rq = DuploS3BucketRequest {
            name: name.clone(),
            in_tenant_region: true,
            ..Default::default()
        };
        client.tenant_create_s3_bucket(&tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Unable to create s3 bucket (tenant: {}, bucket: {}: error: {})",
                tenant_id, name, e
            ))
        })?;

        let id = format!("{}/{}", tenant_id, name);
        let (tid, short) = (tenant_id.as_str(), name.as_str());
        let get = move || client.tenant_get_s3_bucket(tid, short);
        wait_for_resource_to_be_present_after_create(ctx, d, "S3 bucket", &id, get).await?;
        d.set_id(id);

        self.update_legacy(d, client).await?;
        tracing::trace!("resourceS3BucketCreateOldApi({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn update_legacy(&self, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceS3BucketUpdateOldApi({}, {}): start", tenant_id, name);

        let mut rq = DuploS3BucketSettingsRequest {
            name: name.clone(),
            ..Default::default()
        };
        fill_s3_bucket_request(&mut rq, d)?;
        // The settings API has no region support.
        rq.region.clear();

        let bucket = client.tenant_apply_s3_bucket_settings(&tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Unable to update s3 bucket settings (tenant: {}, bucket: {}: error: {})",
                tenant_id, name, e
            ))
        })?;
        flatten_s3_bucket(d, &tenant_id, &name, &bucket);

        tracing::trace!("resourceS3BucketUpdateOldApi({}, {}): end", tenant_id, name);
        Ok(())
    }
}

#[async_trait]
impl Resource for S3BucketResource {
    fn name(&self) -> &'static str {
        "duplocloud_s3_bucket"
    }

    fn schema(&self) -> ResourceSchema {
        s3_bucket_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceS3BucketCreate({}, {}): start", tenant_id, name);

        let features = client.admin_get_system_features().await.ok().flatten();
        let max_length = s3_max_name_length(features.as_ref());
        if name.len() > max_length {
            return diag_errorf!(
                "resourceS3BucketCreate: Invalid s3 bucket name: {}, Length must be in the range: (1 - {})",
                name,
                max_length
            );
        }
        let full_name = s3_bucket_full_name(client, features.as_ref(), &tenant_id, &name).await?;

        let mut rq = DuploS3BucketSettingsRequest {
            name: name.clone(),
            ..Default::default()
        };
        fill_s3_bucket_request(&mut rq, d)?;

        match client.tenant_create_v3_s3_bucket(&tenant_id, &rq).await {
            Ok(_) => {}
            Err(e) if e.possible_missing_api() => return self.create_legacy(ctx, d, client).await,
            Err(e) => {
                return diag_errorf!(
                    "resourceS3BucketCreate: Unable to create s3 bucket using v3 api (tenant: {}, bucket: {}: error: {})",
                    tenant_id,
                    name,
                    e
                )
            }
        }

        let id = format!("{}/{}", tenant_id, name);
        let (tid, full) = (tenant_id.as_str(), full_name.as_str());
        let get = move || client.tenant_get_v3_s3_bucket(tid, full);
        wait_for_resource_to_be_present_after_create(ctx, d, "S3 bucket", &id, get).await?;
        d.set_id(id);

        // Settings are only applied once the bucket exists.
        rq.name = full_name.clone();
        client
            .tenant_update_v3_s3_bucket(&tenant_id, &rq)
            .await
            .map_err(Diagnostics::from_err)?;

        let bucket = match client.tenant_get_v3_s3_bucket(&tenant_id, &full_name).await {
            Ok(Some(bucket)) => bucket,
            Ok(None) => {
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return diag_errorf!(
                    "resourceS3BucketCreate: Unable to retrieve s3 bucket details using v3 api (tenant: {}, bucket: {}: error: {})",
                    tenant_id,
                    name,
                    e
                )
            }
        };
        flatten_s3_bucket(d, &tenant_id, &name, &bucket);

        tracing::trace!("resourceS3BucketCreate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceS3BucketRead")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceS3BucketRead({}, {}): start", tenant_id, name);

        let features = client.admin_get_system_features().await.ok().flatten();
        let full_name = s3_bucket_full_name(client, features.as_ref(), tenant_id, name).await?;

        let bucket = match client.tenant_get_v3_s3_bucket(tenant_id, &full_name).await {
            Ok(bucket) => bucket,
            Err(e) if e.possible_missing_api() => client
                .tenant_get_s3_bucket_settings(tenant_id, name)
                .await
                .map_err(|e| {
                    Diagnostics::errorf(format!(
                        "resourceS3BucketRead: Unable to retrieve s3 bucket settings (tenant: {}, bucket: {}: error: {})",
                        tenant_id, name, e
                    ))
                })?,
            Err(e) => {
                return diag_errorf!(
                    "resourceS3BucketRead: Unable to retrieve s3 bucket (tenant: {}, bucket: {}: error: {})",
                    tenant_id,
                    name,
                    e
                )
            }
        };

        match bucket {
            Some(bucket) => flatten_s3_bucket(d, tenant_id, name, &bucket),
            None => d.set_id(""),
        }

        tracing::trace!("resourceS3BucketRead({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn update(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceS3BucketUpdate({}, {}): start", tenant_id, name);

        let mut rq = DuploS3BucketSettingsRequest {
            name: d.get_string("fullname"),
            ..Default::default()
        };
        fill_s3_bucket_request(&mut rq, d)?;

        let bucket = match client.tenant_update_v3_s3_bucket(&tenant_id, &rq).await {
            Ok(bucket) => bucket,
            Err(e) if e.possible_missing_api() => return self.update_legacy(d, client).await,
            Err(e) => {
                return diag_errorf!(
                    "resourceS3BucketUpdate: Unable to update s3 bucket using v3 api (tenant: {}, bucket: {}: error: {})",
                    tenant_id,
                    rq.name,
                    e
                )
            }
        };
        flatten_s3_bucket(d, &tenant_id, &name, &bucket);

        tracing::trace!("resourceS3BucketUpdate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceS3BucketDelete")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceS3BucketDelete({}, {}): start", tenant_id, name);

        match client.tenant_delete_s3_bucket(tenant_id, name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return diag_errorf!(
                    "resourceS3BucketDelete: Unable to delete bucket (name:{}, error: {})",
                    id,
                    e
                )
            }
        }

        let get = move || client.tenant_get_s3_bucket(tenant_id, name);
        wait_for_resource_to_be_missing_after_delete(ctx, d, "bucket", &id, get).await?;

        // Bucket deletion is eventually consistent.
        wait::sleep(ctx, DELETE_SETTLE_TIME).await.map_err(Diagnostics::from_err)?;

        tracing::trace!("resourceS3BucketDelete({}, {}): end", tenant_id, name);
        Ok(())
    }
}
