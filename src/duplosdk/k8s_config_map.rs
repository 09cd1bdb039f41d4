//! Kubernetes config map API

use super::client::DuploClient;
use super::error::ClientResult;
use super::types::null_default;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Kubernetes config map, with metadata and data kept as raw JSON objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploK8sConfigMap {
    #[serde(default, deserialize_with = "null_default")]
    pub metadata: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub data: Map<String, Value>,
}

impl DuploK8sConfigMap {
    /// A request carrying only `metadata.name` and `data`
    pub fn new(name: &str, data: Map<String, Value>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::String(name.to_string()));
        Self { metadata, data }
    }

    /// `metadata.name`, empty when absent
    pub fn name(&self) -> &str {
        self.metadata
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

fn config_map_list_path(tenant_id: &str) -> String {
    format!("v2/subscriptions/{}/K8ConfigMapApiV2", tenant_id)
}

/// Resource ID of a config map, also its item API path
pub fn config_map_id(tenant_id: &str, name: &str) -> String {
    format!("{}/{}", config_map_list_path(tenant_id), name)
}

impl DuploClient {
    pub async fn k8_config_map_get_list(&self, tenant_id: &str) -> ClientResult<Vec<DuploK8sConfigMap>> {
        let list: Option<Vec<DuploK8sConfigMap>> = self
            .get_api(
                &format!("K8ConfigMapGetList({})", tenant_id),
                &config_map_list_path(tenant_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    pub async fn k8_config_map_get(&self, tenant_id: &str, name: &str) -> ClientResult<Option<DuploK8sConfigMap>> {
        self.get_api(
            &format!("K8ConfigMapGet({}, {})", tenant_id, name),
            &config_map_id(tenant_id, name),
        )
        .await
    }

    pub async fn k8_config_map_create(&self, tenant_id: &str, rq: &DuploK8sConfigMap) -> ClientResult<()> {
        let _: Option<Value> = self
            .post_api(
                &format!("K8ConfigMapCreate({}, {})", tenant_id, rq.name()),
                &config_map_list_path(tenant_id),
                rq,
            )
            .await?;
        Ok(())
    }

    pub async fn k8_config_map_update(&self, tenant_id: &str, rq: &DuploK8sConfigMap) -> ClientResult<()> {
        let _: Option<Value> = self
            .put_api(
                &format!("K8ConfigMapUpdate({}, {})", tenant_id, rq.name()),
                &config_map_list_path(tenant_id),
                rq,
            )
            .await?;
        Ok(())
    }

    /// Delete a config map; the backend answers 204
    pub async fn k8_config_map_delete(&self, tenant_id: &str, name: &str) -> ClientResult<()> {
        self.delete_api_with_status(
            &format!("K8ConfigMapDelete({}, {})", tenant_id, name),
            &config_map_id(tenant_id, name),
            204,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_map_id() {
        assert_eq!(
            config_map_id("t1", "app-config"),
            "v2/subscriptions/t1/K8ConfigMapApiV2/app-config"
        );
    }

    #[test]
    fn test_new_sets_metadata_name() {
        let data = json!({"LOG_LEVEL": "debug"}).as_object().cloned().unwrap();
        let cm = DuploK8sConfigMap::new("app-config", data);
        assert_eq!(cm.name(), "app-config");
        assert_eq!(
            serde_json::to_value(&cm).unwrap(),
            json!({"metadata": {"name": "app-config"}, "data": {"LOG_LEVEL": "debug"}})
        );
    }

    #[test]
    fn test_missing_name_is_empty() {
        let cm: DuploK8sConfigMap = serde_json::from_str(r#"{"metadata":null,"data":null}"#).unwrap();
        assert_eq!(cm.name(), "");
        assert!(cm.data.is_empty());
    }
}
