//! `duplocloud_k8_config_map`
//!
//! `data` and `metadata` travel through state as JSON encoded strings.

use crate::diag::{DiagResult, Diagnostics};
use crate::duplosdk::k8s_config_map::{config_map_id, DuploK8sConfigMap};
use crate::duplosdk::DuploClient;
use crate::resource::Resource;
use crate::resource_data::{to_json_string_field, to_json_string_state, ResourceData};
use crate::schema::{ResourceSchema, Schema, Timeouts};
use crate::validation;
use crate::wait::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

pub struct K8ConfigMapResource;

fn k8_config_map_schema() -> ResourceSchema {
    ResourceSchema::new("`duplocloud_k8_config_map` manages a kubernetes configmap in a Duplo tenant.")
        .field(
            "name",
            Schema::string()
                .description("The name of the configmap.")
                .required()
                .force_new()
                .validate(validation::dns_subdomain_rfc1123()),
        )
        .field(
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the configmap will be created in.")
                .required()
                .force_new()
                .validate(validation::is_uuid()),
        )
        .field(
            "data",
            Schema::string()
                .description(
                    "A JSON encoded string representing the configmap data. \
                     You can use the `jsonencode()` function to build this from JSON.",
                )
                .required()
                .validate(validation::string_is_json()),
        )
        .field(
            "metadata",
            Schema::string()
                .description(
                    "A JSON encoded string representing the configmap metadata. \
                     You can use the `jsondecode()` function to parse this, if needed.",
                )
                .computed(),
        )
        .timeouts(
            Timeouts::default()
                .create(Duration::from_secs(15 * 60))
                .update(Duration::from_secs(15 * 60))
                .delete(Duration::from_secs(15 * 60)),
        )
        .importable()
}

/// Fields of a config map as seen by the data sources; everything but the keys is computed
pub(crate) fn k8_config_map_schema_computed() -> Vec<(&'static str, Schema)> {
    vec![
        ("name", Schema::string().description("The name of the configmap.").required()),
        (
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the configmap will be created in.")
                .required(),
        ),
        (
            "data",
            Schema::string()
                .description(
                    "A JSON encoded string representing the configmap data. \
                     You can use the `jsondecode()` function to parse this, if needed.",
                )
                .computed(),
        ),
        (
            "metadata",
            Schema::string()
                .description(
                    "A JSON encoded string representing the configmap metadata. \
                     You can use the `jsondecode()` function to parse this, if needed.",
                )
                .computed(),
        ),
    ]
}

fn parse_k8_config_map_id_parts(id: &str) -> DiagResult<(&str, &str)> {
    let parts: Vec<&str> = id.splitn(5, '/').collect();
    match parts.as_slice() {
        [_, _, tenant_id, _, name] => Ok((tenant_id, name)),
        _ => Err(Diagnostics::errorf(format!("invalid resource ID: {}", id))),
    }
}

fn expand_k8_config_map(d: &ResourceData) -> DiagResult<DuploK8sConfigMap> {
    let raw = d.get_string("data");
    let data = if raw.is_empty() {
        Map::new()
    } else {
        serde_json::from_str::<Map<String, Value>>(&raw).map_err(Diagnostics::from_err)?
    };
    Ok(DuploK8sConfigMap::new(&d.get_string("name"), data))
}

pub(crate) fn flatten_k8_config_map(d: &mut ResourceData, tenant_id: &str, duplo: &DuploK8sConfigMap) {
    d.set("tenant_id", tenant_id);
    d.set("name", duplo.name());
    to_json_string_state("data", &duplo.data, d);
    to_json_string_state("metadata", &duplo.metadata, d);
}

/// One `config_maps` list entry
pub(crate) fn k8_config_map_to_state(tenant_id: &str, duplo: &DuploK8sConfigMap) -> Map<String, Value> {
    let mut cm = Map::new();
    cm.insert("tenant_id".to_string(), Value::from(tenant_id));
    cm.insert("name".to_string(), Value::from(duplo.name()));
    to_json_string_field("data", &duplo.data, &mut cm);
    to_json_string_field("metadata", &duplo.metadata, &mut cm);
    cm
}

#[async_trait]
impl Resource for K8ConfigMapResource {
    fn name(&self) -> &'static str {
        "duplocloud_k8_config_map"
    }

    fn schema(&self) -> ResourceSchema {
        k8_config_map_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceK8ConfigMapCreate({}, {}): start", tenant_id, name);

        let rq = expand_k8_config_map(d)?;
        client
            .k8_config_map_create(&tenant_id, &rq)
            .await
            .map_err(Diagnostics::from_err)?;
        d.set_id(config_map_id(&tenant_id, &name));

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceK8ConfigMapCreate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let (tenant_id, name) = parse_k8_config_map_id_parts(&id)?;
        tracing::trace!("resourceK8ConfigMapRead({}, {}): start", tenant_id, name);

        let rp = match client.k8_config_map_get(tenant_id, name).await {
            Ok(rp) => rp,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(Diagnostics::from_err(e)),
        };
        match rp.filter(|cm| !cm.name().is_empty()) {
            Some(cm) => flatten_k8_config_map(d, tenant_id, &cm),
            None => d.set_id(""),
        }

        tracing::trace!("resourceK8ConfigMapRead({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let (tenant_id, name) = parse_k8_config_map_id_parts(&id)?;
        tracing::trace!("resourceK8ConfigMapUpdate({}, {}): start", tenant_id, name);

        let rq = expand_k8_config_map(d)?;
        client
            .k8_config_map_update(tenant_id, &rq)
            .await
            .map_err(Diagnostics::from_err)?;

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceK8ConfigMapUpdate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn delete(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let (tenant_id, name) = parse_k8_config_map_id_parts(&id)?;
        tracing::trace!("resourceK8ConfigMapDelete({}, {}): start", tenant_id, name);

        let existing = match client.k8_config_map_get(tenant_id, name).await {
            Ok(rp) => rp,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(Diagnostics::from_err(e)),
        };
        if existing.is_some_and(|cm| !cm.name().is_empty()) {
            match client.k8_config_map_delete(tenant_id, name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(Diagnostics::from_err(e)),
            }
        }

        tracing::trace!("resourceK8ConfigMapDelete({}, {}): end", tenant_id, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_id() {
        let id = config_map_id("t1", "app-config");
        assert_eq!(parse_k8_config_map_id_parts(&id).unwrap(), ("t1", "app-config"));
        assert!(parse_k8_config_map_id_parts("t1/app-config").is_err());
    }

    #[test]
    fn test_expand_decodes_json_data() {
        let d = ResourceData::default().with_config(
            json!({"name": "app-config", "data": "{\"LOG_LEVEL\":\"debug\"}"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let cm = expand_k8_config_map(&d).unwrap();
        assert_eq!(cm.name(), "app-config");
        assert_eq!(cm.data.get("LOG_LEVEL"), Some(&json!("debug")));
    }

    #[test]
    fn test_expand_rejects_invalid_json() {
        let d = ResourceData::default().with_config(
            json!({"name": "app-config", "data": "not json"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(expand_k8_config_map(&d).is_err());
    }

    #[test]
    fn test_to_state_encodes_json_fields() {
        let cm = DuploK8sConfigMap::new("app-config", json!({"A": "1"}).as_object().cloned().unwrap());
        let state = k8_config_map_to_state("t1", &cm);
        assert_eq!(state["name"], json!("app-config"));
        let data: Value = serde_json::from_str(state["data"].as_str().unwrap()).unwrap();
        assert_eq!(data, json!({"A": "1"}));
    }
}
