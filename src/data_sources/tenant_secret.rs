//! `duplocloud_tenant_secret` and `duplocloud_tenant_secrets`

use super::computed_list_of;
use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::tenant_secret::DuploTenantSecret;
use crate::duplosdk::DuploClient;
use crate::resource::DataSource;
use crate::resource_data::{key_value_to_state, ResourceData};
use crate::resources::tenant_secret::flatten_tenant_secret;
use crate::schema::{key_value_schema, ResourceSchema, Schema};
use crate::wait::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct TenantSecretDataSource;
pub struct TenantSecretsDataSource;

fn tenant_secret_schema_computed() -> Vec<(&'static str, Schema)> {
    vec![
        ("tenant_id", Schema::string().description("The GUID of the tenant.").required()),
        ("arn", Schema::string().description("The ARN of the secret.").optional().computed()),
        ("name", Schema::string().description("The full name of the secret.").optional().computed()),
        (
            "name_suffix",
            Schema::string()
                .description("The short name of the secret.")
                .optional()
                .computed(),
        ),
        ("rotation_enabled", Schema::bool().description("Whether rotation is enabled.").computed()),
        ("tags", Schema::list(key_value_schema()).description("The secret tags.").computed()),
    ]
}

/// How a single secret is looked up
#[derive(Debug, PartialEq)]
enum SecretLookup {
    Arn(String),
    Name(String),
    NameSuffix(String),
}

impl SecretLookup {
    fn from_data(d: &ResourceData) -> DiagResult<Self> {
        let candidates = [
            d.get_ok("arn").map(|v| SecretLookup::Arn(as_string(v))),
            d.get_ok("name").map(|v| SecretLookup::Name(as_string(v))),
            d.get_ok("name_suffix").map(|v| SecretLookup::NameSuffix(as_string(v))),
        ];
        let mut set = candidates.into_iter().flatten();
        match (set.next(), set.next()) {
            (Some(lookup), None) => Ok(lookup),
            (Some(_), Some(_)) => diag_errorf!("specify only arn or name or name_suffix"),
            (None, _) => diag_errorf!("must specify either arn or name or name_suffix"),
        }
    }

    fn matches(&self, secret: &DuploTenantSecret) -> bool {
        match self {
            SecretLookup::Arn(arn) => &secret.arn == arn,
            SecretLookup::Name(name) => &secret.name == name,
            SecretLookup::NameSuffix(suffix) => secret_suffix(secret) == suffix,
        }
    }

    fn key(&self) -> &str {
        match self {
            SecretLookup::Arn(s) | SecretLookup::Name(s) | SecretLookup::NameSuffix(s) => s,
        }
    }
}

fn as_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Suffix of the name, or the whole name when it is not tenant-decorated
fn secret_suffix(secret: &DuploTenantSecret) -> &str {
    secret.name_suffix().unwrap_or(&secret.name)
}

#[async_trait]
impl DataSource for TenantSecretDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_tenant_secret"
    }

    fn schema(&self) -> ResourceSchema {
        tenant_secret_schema_computed().into_iter().fold(
            ResourceSchema::new("`duplocloud_tenant_secret` retrieves a secret by arn, name or name suffix."),
            |schema, (k, v)| schema.field(k, v),
        )
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        tracing::trace!("dataSourceTenantSecretRead({}): start", tenant_id);

        let lookup = SecretLookup::from_data(d)?;
        let secrets = client
            .tenant_list_secrets(&tenant_id)
            .await
            .map_err(|e| Diagnostics::errorf(format!("Failed to list secrets: {}", e)))?;

        let secret = secrets
            .iter()
            .find(|s| lookup.matches(s))
            .ok_or_else(|| Diagnostics::errorf(format!("Tenant secret '{}' not found", lookup.key())))?;

        d.set_id(format!("{}/{}", tenant_id, secret.name));
        flatten_tenant_secret(d, &tenant_id, secret);
        d.set("name_suffix", secret_suffix(secret));

        tracing::trace!("dataSourceTenantSecretRead({}): end", tenant_id);
        Ok(())
    }
}

#[async_trait]
impl DataSource for TenantSecretsDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_tenant_secrets"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("`duplocloud_tenant_secrets` lists the secrets of a tenant.")
            .field(
                "tenant_id",
                Schema::string().description("The GUID of the tenant.").required(),
            )
            .field(
                "secrets",
                computed_list_of(tenant_secret_schema_computed()).description("The secrets of the tenant."),
            )
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        tracing::trace!("dataSourceTenantSecretsRead({}): start", tenant_id);

        let secrets = client
            .tenant_list_secrets(&tenant_id)
            .await
            .map_err(|e| Diagnostics::errorf(format!("Failed to list secrets: {}", e)))?;

        let list: Vec<Value> = secrets
            .iter()
            .map(|s| {
                json!({
                    "tenant_id": tenant_id,
                    "arn": s.arn,
                    "name": s.name,
                    "name_suffix": secret_suffix(s),
                    "rotation_enabled": s.rotation_enabled,
                    "tags": key_value_to_state("tags", &s.tags),
                })
            })
            .collect();
        d.set_id(tenant_id.clone());
        d.set("secrets", list);

        tracing::trace!("dataSourceTenantSecretsRead({}): end", tenant_id);
        Ok(())
    }
}
