//! `duplocloud_tenant_secret`

use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::diff::diff_suppress_func_ignore;
use crate::duplosdk::tenant_secret::{DuploTenantSecret, DuploTenantSecretRequest};
use crate::duplosdk::DuploClient;
use crate::resource::{parse_id, Resource};
use crate::resource_data::{key_value_to_state, ResourceData};
use crate::schema::{key_value_schema, ResourceSchema, Schema, Timeouts};
use crate::wait::{wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create, Context};
use async_trait::async_trait;
use std::time::Duration;

pub struct TenantSecretResource;

pub(crate) fn tenant_secret_schema() -> ResourceSchema {
    ResourceSchema::new("`duplocloud_tenant_secret` manages an AWS Secrets Manager secret in a Duplo tenant.")
        .field(
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the secret will be created in.")
                .required()
                .force_new(),
        )
        .field("arn", Schema::string().description("The ARN of the secret.").computed())
        .field(
            "name",
            Schema::string()
                .description("The full name of the secret.")
                .computed(),
        )
        .field(
            "name_suffix",
            Schema::string()
                .description("The short name of the secret. The full name is generated by Duplo.")
                .required()
                .force_new(),
        )
        .field(
            "data",
            Schema::string()
                .description("The plaintext secret data.")
                .required()
                .force_new()
                .sensitive()
                .diff_suppress(diff_suppress_func_ignore),
        )
        .field("rotation_enabled", Schema::bool().computed())
        .field("tags", Schema::list(key_value_schema()).computed())
        .timeouts(
            Timeouts::default()
                .create(Duration::from_secs(75 * 60))
                .delete(Duration::from_secs(15 * 60)),
        )
        .importable()
}

/// Attributes shared with the data sources; `data` is never read back
pub(crate) fn flatten_tenant_secret(d: &mut ResourceData, tenant_id: &str, duplo: &DuploTenantSecret) {
    d.set("tenant_id", tenant_id);
    d.set("name", duplo.name.clone());
    d.set("arn", duplo.arn.clone());
    d.set("rotation_enabled", duplo.rotation_enabled);
    if let Some(suffix) = duplo.name_suffix() {
        d.set("name_suffix", suffix);
    }
    d.set("tags", key_value_to_state("tags", &duplo.tags));
}

#[async_trait]
impl Resource for TenantSecretResource {
    fn name(&self) -> &'static str {
        "duplocloud_tenant_secret"
    }

    fn schema(&self) -> ResourceSchema {
        tenant_secret_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let rq = DuploTenantSecretRequest {
            name: d.get_string("name_suffix"),
            secret_string: d.get_string("data"),
        };
        tracing::trace!("resourceTenantSecretCreate({}, {}): start", tenant_id, rq.name);

        client.tenant_create_secret(&tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Error creating tenant {} secret '{}': {}",
                tenant_id, rq.name, e
            ))
        })?;

        let kind = format!("tenant {} secret", tenant_id);
        let (tid, suffix) = (tenant_id.as_str(), rq.name.as_str());
        let get = move || client.tenant_get_secret_by_name_suffix(tid, suffix);
        wait_for_resource_to_be_present_after_create(ctx, d, &kind, &rq.name, get).await?;

        let created = client
            .tenant_get_secret_by_name_suffix(&tenant_id, &rq.name)
            .await
            .map_err(Diagnostics::from_err)?
            .ok_or_else(|| {
                Diagnostics::errorf(format!(
                    "Expected tenant {} secret '{}' to be retrieved, but got: nil",
                    tenant_id, rq.name
                ))
            })?;
        d.set_id(format!("{}/{}", tenant_id, created.name));

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceTenantSecretCreate({}, {}): end", tenant_id, rq.name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceTenantSecretRead")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceTenantSecretRead({}, {}): start", tenant_id, name);

        let duplo = match client.tenant_get_secret_by_name(tenant_id, name).await {
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
                return diag_errorf!("Unable to retrieve tenant {} secret '{}': {}", tenant_id, name, e);
            }
        };

        d.set_id(format!("{}/{}", tenant_id, duplo.name));
        flatten_tenant_secret(d, tenant_id, &duplo);

        tracing::trace!("resourceTenantSecretRead({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceTenantSecretDelete")?;
        let (tenant_id, name) = (parts[0], parts[1]);
        tracing::trace!("resourceTenantSecretDelete({}, {}): start", tenant_id, name);

        match client.tenant_delete_secret(tenant_id, name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return diag_errorf!("Error deleting secret '{}': {}", id, e),
        }

        let get = move || client.tenant_get_secret_by_name(tenant_id, name);
        wait_for_resource_to_be_missing_after_delete(ctx, d, "tenant secret", &id, get).await?;

        tracing::trace!("resourceTenantSecretDelete({}, {}): end", tenant_id, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplosdk::types::DuploKeyStringValue;
    use serde_json::json;

    #[test]
    fn test_data_is_sensitive_and_suppressed() {
        let schema = tenant_secret_schema();
        let data = schema.get("data").unwrap();
        assert!(data.sensitive && data.force_new);
        assert!(data.diff_suppress.is_some());
    }

    #[test]
    fn test_flatten_sets_suffix() {
        let mut d = ResourceData::default();
        let secret = DuploTenantSecret {
            name: "duploservices-dev-db-password".into(),
            arn: "arn:aws:secretsmanager:us-west-2:1:secret:x".into(),
            tags: vec![DuploKeyStringValue::new("owner", "ops")],
            ..Default::default()
        };
        flatten_tenant_secret(&mut d, "t1", &secret);
        assert_eq!(d.get_string("name_suffix"), "db-password");
        assert_eq!(d.get("tags"), json!([{"key": "owner", "value": "ops"}]));
        assert_eq!(d.get("data"), serde_json::Value::Null);
    }
}
