//! `duplocloud_tenant` and `duplocloud_tenants`

use super::{block, computed_list_of};
use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::tenant::DuploTenant;
use crate::duplosdk::DuploClient;
use crate::resource::DataSource;
use crate::resource_data::{key_value_to_state, ResourceData};
use crate::schema::{key_value_schema, ResourceSchema, Schema};
use crate::wait::Context;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub struct TenantDataSource;
pub struct TenantsDataSource;

fn tenant_schema_computed(nested: bool) -> Vec<(&'static str, Schema)> {
    let lookup_key = |s: Schema| {
        if nested {
            s.computed()
        } else {
            s.optional().computed().exactly_one_of(&["id", "name"])
        }
    };
    vec![
        ("id", lookup_key(Schema::string().description("The GUID of the tenant."))),
        ("name", lookup_key(Schema::string().description("The name of the tenant."))),
        ("plan_id", Schema::string().description("The name of the plan the tenant belongs to.").computed()),
        ("infra_owner", Schema::string().description("The infrastructure owning the tenant.").computed()),
        (
            "policy",
            Schema::list(block(vec![
                ("allow_volume_mapping", Schema::bool().computed()),
                ("block_external_ep", Schema::bool().computed()),
            ]))
            .description("The tenant policy.")
            .computed(),
        ),
        ("tags", Schema::list(key_value_schema()).description("The tenant tags.").computed()),
    ]
}

/// A tenant as a map of the computed tenant fields
fn tenant_to_state(duplo: &DuploTenant) -> Map<String, Value> {
    let mut tenant = Map::new();
    tenant.insert("id".to_string(), json!(duplo.tenant_id));
    tenant.insert("name".to_string(), json!(duplo.account_name));
    tenant.insert("plan_id".to_string(), json!(duplo.plan_id));
    tenant.insert("infra_owner".to_string(), json!(duplo.infra_owner));
    if let Some(policy) = &duplo.tenant_policy {
        tenant.insert(
            "policy".to_string(),
            json!([{
                "allow_volume_mapping": policy.allow_volume_mapping,
                "block_external_ep": policy.block_external_ep,
            }]),
        );
    }
    tenant.insert("tags".to_string(), Value::Array(key_value_to_state("tags", &duplo.tags)));
    tenant
}

#[async_trait]
impl DataSource for TenantDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_tenant"
    }

    fn schema(&self) -> ResourceSchema {
        tenant_schema_computed(false)
            .into_iter()
            .fold(
                ResourceSchema::new("`duplocloud_tenant` retrieves a tenant by id or name."),
                |schema, (k, v)| schema.field(k, v),
            )
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        tracing::trace!("dataSourceTenantRead(): start");

        let tenant_id = d.id().to_string();
        let tenant_name = d.get_string("name");
        let result = if !tenant_id.is_empty() {
            client.get_tenant_for_user(&tenant_id).await
        } else if !tenant_name.is_empty() {
            client.get_tenant_by_name_for_user(&tenant_name).await
        } else {
            return diag_errorf!("one of `id` or `name` must be specified");
        };

        let duplo = result
            .map_err(|e| Diagnostics::errorf(format!("failed to get tenant: {}", e)))?
            .ok_or_else(|| {
                let key = if tenant_id.is_empty() { &tenant_name } else { &tenant_id };
                Diagnostics::errorf(format!("tenant '{}' not found", key))
            })?;

        d.set_id(duplo.tenant_id.clone());
        for (k, v) in tenant_to_state(&duplo) {
            if k != "id" {
                d.set(&k, v);
            }
        }

        tracing::trace!("dataSourceTenantRead(): end");
        Ok(())
    }
}

#[async_trait]
impl DataSource for TenantsDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_tenants"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("`duplocloud_tenants` lists the tenants visible to the current user.")
            .field(
                "plan_id",
                Schema::string()
                    .description("Only list the tenants of this plan.")
                    .optional(),
            )
            .field("tenants", computed_list_of(tenant_schema_computed(true)).description("The matching tenants."))
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        tracing::trace!("dataSourceTenantsRead(): start");

        let plan_id = d.get_string("plan_id");
        let tenants = client
            .list_tenants_for_user_by_plan(&plan_id)
            .await
            .map_err(|e| Diagnostics::errorf(format!("failed to list tenants: {}", e)))?;

        let list: Vec<Value> = tenants.iter().map(|t| Value::Object(tenant_to_state(t))).collect();
        d.set_id("user-tenants");
        d.set("tenants", list);

        tracing::trace!("dataSourceTenantsRead(): end");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplosdk::tenant::DuploTenantPolicy;

    #[test]
    fn test_tenant_to_state_uses_actual_policy() {
        let duplo = DuploTenant {
            tenant_id: "abc".into(),
            account_name: "dev".into(),
            tenant_policy: Some(DuploTenantPolicy {
                allow_volume_mapping: false,
                block_external_ep: true,
            }),
            ..Default::default()
        };
        let state = tenant_to_state(&duplo);
        assert_eq!(state["id"], json!("abc"));
        assert_eq!(state["name"], json!("dev"));
        assert_eq!(
            state["policy"],
            json!([{"allow_volume_mapping": false, "block_external_ep": true}])
        );
        assert_eq!(state["tags"], json!([]));
    }

    #[test]
    fn test_tenant_without_policy_omits_it() {
        let state = tenant_to_state(&DuploTenant::default());
        assert!(!state.contains_key("policy"));
    }

    #[test]
    fn test_lookup_keys_are_exclusive() {
        let schema = TenantDataSource.schema();
        assert_eq!(schema.get("id").unwrap().exactly_one_of, vec!["id", "name"]);
        let nested = TenantsDataSource.schema();
        let tenants = nested.get("tenants").unwrap().block().unwrap();
        assert!(tenants["id"].exactly_one_of.is_empty());
        assert!(tenants["name"].computed);
    }
}
