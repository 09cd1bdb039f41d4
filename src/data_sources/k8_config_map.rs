//! `duplocloud_k8_config_map` and `duplocloud_k8_config_maps`

use super::computed_list_of;
use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::DuploClient;
use crate::resource::DataSource;
use crate::resource_data::ResourceData;
use crate::resources::k8_config_map::{flatten_k8_config_map, k8_config_map_schema_computed, k8_config_map_to_state};
use crate::schema::{ResourceSchema, Schema};
use crate::wait::Context;
use async_trait::async_trait;
use serde_json::Value;

pub struct K8ConfigMapDataSource;
pub struct K8ConfigMapsDataSource;

#[async_trait]
impl DataSource for K8ConfigMapDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_k8_config_map"
    }

    fn schema(&self) -> ResourceSchema {
        k8_config_map_schema_computed().into_iter().fold(
            ResourceSchema::new("`duplocloud_k8_config_map` retrieves a kubernetes configmap in a Duplo tenant."),
            |schema, (k, v)| schema.field(k, v),
        )
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        let id = format!("{}/{}", tenant_id, name);
        tracing::trace!("dataSourceK8ConfigMapRead({}): start", id);

        let rp = match client.k8_config_map_get(&tenant_id, &name).await {
            Ok(rp) => rp,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(Diagnostics::from_err(e)),
        };
        let Some(cm) = rp.filter(|cm| !cm.name().is_empty()) else {
            return diag_errorf!("tenant configmap '{}' not found", id);
        };

        d.set_id(id.clone());
        flatten_k8_config_map(d, &tenant_id, &cm);

        tracing::trace!("dataSourceK8ConfigMapRead({}): end", id);
        Ok(())
    }
}

#[async_trait]
impl DataSource for K8ConfigMapsDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_k8_config_maps"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("`duplocloud_k8_config_maps` lists all kubernetes configmaps in a Duplo tenant.")
            .field(
                "tenant_id",
                Schema::string()
                    .description("The GUID of the tenant to list configmaps from.")
                    .required(),
            )
            .field(
                "config_maps",
                computed_list_of(k8_config_map_schema_computed()).description("The configmaps of the tenant."),
            )
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        tracing::trace!("dataSourceK8ConfigMapsRead({}): start", tenant_id);

        let list = client
            .k8_config_map_get_list(&tenant_id)
            .await
            .map_err(Diagnostics::from_err)?;
        let config_maps: Vec<Value> = list
            .iter()
            .map(|cm| Value::Object(k8_config_map_to_state(&tenant_id, cm)))
            .collect();

        d.set("config_maps", config_maps);
        d.set_id(tenant_id.clone());

        tracing::trace!("dataSourceK8ConfigMapsRead({}): end", tenant_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_schema_is_read_only() {
        let schema = K8ConfigMapsDataSource.schema();
        let fields = schema.get("config_maps").unwrap().block().unwrap();
        assert!(fields.values().all(|f| f.computed && !f.required));
    }

    #[test]
    fn test_single_lookup_keys_are_required() {
        let schema = K8ConfigMapDataSource.schema();
        assert!(schema.get("name").unwrap().required);
        assert!(schema.get("data").unwrap().computed);
    }
}
