//! `duplocloud_tenant`

use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::tenant::DuploTenant;
use crate::duplosdk::types::cloud;
use crate::duplosdk::DuploClient;
use crate::resource::Resource;
use crate::resource_data::{key_value_to_state, ResourceData};
use crate::schema::{key_value_schema, Elem, ResourceSchema, Schema, Timeouts};
use crate::validation;
use crate::wait::{
    self, wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create, Context,
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;

static K8S_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

const DEFAULT_TENANT_NAME_MAX_LENGTH: usize = 12;
const CREATE_SETTLE_TIME: Duration = Duration::from_secs(120);
const DELETE_SETTLE_TIME: Duration = Duration::from_secs(60);

pub struct TenantResource;

/// `v2/admin/TenantV2/<tenant id>`
pub fn tenant_resource_id(tenant_id: &str) -> String {
    format!("v2/admin/TenantV2/{}", tenant_id)
}

fn parse_tenant_id_parts(id: &str) -> Option<&str> {
    let parts: Vec<&str> = id.splitn(4, '/').collect();
    match parts.as_slice() {
        [_, _, _, tenant_id] if !tenant_id.is_empty() => Some(tenant_id),
        _ => None,
    }
}

fn policy_schema() -> Schema {
    Schema::list(Elem::Block(
        [
            ("allow_volume_mapping".to_string(), Schema::bool().computed()),
            ("block_external_ep".to_string(), Schema::bool().computed()),
        ]
        .into_iter()
        .collect(),
    ))
    .computed()
}

pub(crate) fn tenant_schema() -> ResourceSchema {
    ResourceSchema::new(
        "`duplocloud_tenant` manages a tenant in Duplo. A DuploCloud tenant is an isolated environment \
         within the DuploCloud platform where you can manage and provision cloud resources.",
    )
    .field(
        "account_name",
        Schema::string()
            .description("The name of the tenant. Tenant names are globally unique, and cannot be a prefix of any other tenant name.")
            .required()
            .force_new(),
    )
    .field(
        "plan_id",
        Schema::string()
            .description("The name of the plan under which the tenant will be created.")
            .required()
            .force_new()
            .validate(validation::string_len_between(1, 30)),
    )
    .field(
        "tenant_id",
        Schema::string()
            .description("A GUID identifying the tenant. This is automatically generated by Duplo.")
            .computed(),
    )
    .field("infra_owner", Schema::string().computed())
    .field(
        "existing_k8s_namespace",
        Schema::string()
            .description("Existing kubernetes namespace to use by the tenant.")
            .optional()
            .computed()
            .validate(validation::all(vec![
                validation::string_len_between(1, 63),
                validation::string_match(
                    &K8S_NAMESPACE,
                    "kubernetes namespace must contain only lower case alphanumeric and hypen, and cannot start or end with hypen",
                ),
            ])),
    )
    .field("policy", policy_schema())
    .field("tags", Schema::list(key_value_schema()).computed())
    .field(
        "wait_until_created",
        Schema::bool()
            .description("Whether or not to wait until Duplo has created the tenant.")
            .optional()
            .default(true),
    )
    .field(
        "allow_deletion",
        Schema::bool()
            .description("Whether or not to even try and delete the tenant. This only works if you have disabled deletion protection for the tenant.")
            .optional()
            .default(false),
    )
    .field(
        "wait_until_deleted",
        Schema::bool()
            .description("Whether or not to wait until Duplo has destroyed the tenant.")
            .optional()
            .default(false),
    )
    .timeouts(
        Timeouts::default()
            .create(Duration::from_secs(3 * 60))
            .update(Duration::from_secs(3 * 60))
            .delete(Duration::from_secs(3 * 60)),
    )
    .importable()
}

/// Write the tenant attributes shared by the resource and data sources
pub(crate) fn flatten_tenant(d: &mut ResourceData, duplo: &DuploTenant) {
    d.set("account_name", duplo.account_name.clone());
    d.set("tenant_id", duplo.tenant_id.clone());
    d.set("plan_id", duplo.plan_id.clone());
    d.set("infra_owner", duplo.infra_owner.clone());
    let policy = match &duplo.tenant_policy {
        Some(policy) => json!([{
            "allow_volume_mapping": policy.allow_volume_mapping,
            "block_external_ep": policy.block_external_ep,
        }]),
        None => json!([]),
    };
    d.set("policy", policy);
    d.set("tags", key_value_to_state("tags", &duplo.tags));
}

async fn validate_tenant_name(client: &DuploClient, account_name: &str) -> DiagResult<()> {
    let mut max_length = DEFAULT_TENANT_NAME_MAX_LENGTH;
    // Feature flags are optional; fall back to the default limit.
    if let Ok(Some(features)) = client.admin_get_system_features().await {
        max_length = max_length.max(features.tenant_name_max_length);
    }
    let len = account_name.chars().count();
    if !(2..=max_length).contains(&len) {
        return diag_errorf!(
            "Length of attribute 'account_name' must be between 2 and {} inclusive, got: {}",
            max_length,
            len
        );
    }
    Ok(())
}

#[async_trait]
impl Resource for TenantResource {
    fn name(&self) -> &'static str {
        "duplocloud_tenant"
    }

    fn schema(&self) -> ResourceSchema {
        tenant_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let rq = DuploTenant {
            account_name: d.get_string("account_name"),
            plan_id: d.get_string("plan_id"),
            existing_k8s_namespace: d.get_string("existing_k8s_namespace"),
            ..Default::default()
        };
        tracing::trace!("resourceTenantCreate({}): start", rq.account_name);

        validate_tenant_name(client, &rq.account_name).await?;

        let infra = client
            .infrastructure_get_config(&rq.plan_id)
            .await
            .map_err(|e| {
                Diagnostics::errorf(format!(
                    "Unable to retrieve duplo infrastructure '{}': {}",
                    rq.plan_id, e
                ))
            })?
            .unwrap_or_default();
        if infra.cloud == cloud::GCP && rq.account_name.contains("google") {
            return diag_errorf!("Restricted use of keyword google in account_name for gcp cloud");
        }

        client
            .tenant_create(&rq)
            .await
            .map_err(|e| Diagnostics::errorf(format!("Unable to create tenant '{}': {}", rq.account_name, e)))?;

        let account_name = rq.account_name.as_str();
        let get = move || client.get_tenant_by_name_for_user(account_name);
        wait_for_resource_to_be_present_after_create(ctx, d, "tenant", account_name, get).await?;

        let tenant = client
            .get_tenant_by_name_for_user(&rq.account_name)
            .await
            .map_err(Diagnostics::from_err)?
            .ok_or_else(|| Diagnostics::errorf(format!("Unable to find tenant '{}' after creation", rq.account_name)))?;
        d.set_id(tenant_resource_id(&tenant.tenant_id));
        d.set("tenant_id", tenant.tenant_id.clone());

        if d.get_bool("wait_until_created") {
            tracing::trace!(
                "resourceTenantCreate({}): waiting for 2 minutes because 'wait_until_created' is 'true'",
                rq.account_name
            );
            wait::sleep(ctx, CREATE_SETTLE_TIME).await.map_err(Diagnostics::from_err)?;
            wait_for_resource_to_be_present_after_create(ctx, d, "tenant", account_name, get).await?;
        }

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceTenantCreate({}): end", rq.account_name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let tenant_id = parse_tenant_id_parts(&id)
            .ok_or_else(|| Diagnostics::errorf(format!("Invalid resource ID: {}", id)))?;
        tracing::trace!("resourceTenantRead({}): start", tenant_id);

        let duplo = match client.tenant_get_v3(tenant_id).await {
            Ok(Some(duplo)) => duplo,
            Ok(None) => {
                d.set_id("");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                d.set_id("");
                return Ok(());
            }
            Err(e) => return diag_errorf!("Unable to retrieve tenant '{}': {}", tenant_id, e),
        };

        flatten_tenant(d, &duplo);
        d.set("existing_k8s_namespace", duplo.existing_k8s_namespace.clone());

        tracing::trace!("resourceTenantRead({}): end", tenant_id);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let tenant_id = parse_tenant_id_parts(&id)
            .ok_or_else(|| Diagnostics::errorf(format!("Invalid resource ID: {}", id)))?;
        tracing::trace!("resourceTenantDelete({}): start", tenant_id);

        if !d.get_bool("allow_deletion") {
            tracing::warn!(
                "resourceTenantDelete({}): will NOT delete the tenant - because 'allow_deletion' is 'false'",
                tenant_id
            );
            return Ok(());
        }

        match client.tenant_get_v3(tenant_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(()),
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return diag_errorf!("Unable to retrieve tenant '{}': {}", tenant_id, e),
        }

        match client.tenant_delete(tenant_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return diag_errorf!("Error deleting tenant '{}': {}", tenant_id, e),
        }

        if d.get_bool("wait_until_deleted") {
            tracing::trace!(
                "resourceTenantDelete({}): waiting for 1 minute because 'wait_until_deleted' is 'true'",
                tenant_id
            );
            wait::sleep(ctx, DELETE_SETTLE_TIME).await.map_err(Diagnostics::from_err)?;
        }

        wait_for_resource_to_be_missing_after_delete(ctx, d, "tenant", tenant_id, || {
            client.tenant_get_v3(tenant_id)
        })
        .await?;

        tracing::trace!("resourceTenantDelete({}): end", tenant_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplosdk::tenant::DuploTenantPolicy;
    use crate::schema::validate_config;
    use serde_json::Value;

    #[test]
    fn test_parse_tenant_id_parts() {
        assert_eq!(parse_tenant_id_parts("v2/admin/TenantV2/abc"), Some("abc"));
        assert_eq!(parse_tenant_id_parts("abc"), None);
        assert_eq!(parse_tenant_id_parts("v2/admin/TenantV2/"), None);
    }

    #[test]
    fn test_flatten_policy_uses_actual_values() {
        let mut d = ResourceData::default();
        let duplo = DuploTenant {
            tenant_id: "abc".into(),
            account_name: "dev".into(),
            tenant_policy: Some(DuploTenantPolicy {
                allow_volume_mapping: true,
                block_external_ep: false,
            }),
            ..Default::default()
        };
        flatten_tenant(&mut d, &duplo);
        assert_eq!(d.get("policy.0.allow_volume_mapping"), Value::Bool(true));
        assert_eq!(d.get("policy.0.block_external_ep"), Value::Bool(false));
    }

    #[test]
    fn test_namespace_validation() {
        let schema = tenant_schema();
        let config = json!({"account_name": "dev", "plan_id": "default", "existing_k8s_namespace": "Bad_NS"});
        let diags = validate_config(&schema.fields, config.as_object().unwrap());
        assert!(diags.iter().any(|d| d.attribute.as_deref() == Some("existing_k8s_namespace")));
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(tenant_schema().timeouts.create, Duration::from_secs(180));
    }
}
