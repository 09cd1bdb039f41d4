//! Elastic File System API (v3)

use super::client::DuploClient;
use super::error::ClientResult;
use super::types::{null_default, DuploKeyStringValue, DuploStringValue};
use serde::{Deserialize, Serialize};

/// `LifeCycleState` of a usable file system
pub const EFS_STATE_AVAILABLE: &str = "available";

pub const TRANSITION_TO_IA_RULES: &[&str] = &[
    "AFTER_1_DAY",
    "AFTER_7_DAYS",
    "AFTER_14_DAYS",
    "AFTER_30_DAYS",
    "AFTER_60_DAYS",
    "AFTER_90_DAYS",
    "AFTER_180_DAYS",
    "AFTER_270_DAYS",
    "AFTER_365_DAYS",
];

pub const TRANSITION_TO_PRIMARY_STORAGE_CLASS_RULES: &[&str] = &["AFTER_1_ACCESS"];

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploEfsCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub performance_mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub throughput_mode: String,
    pub backup: bool,
    pub encrypted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub creation_token: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub provisioned_throughput_in_mibps: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploEfsUpdateRequest {
    pub file_system_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_mode: Option<DuploStringValue>,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub provisioned_throughput_in_mibps: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploEfsSizeInBytes {
    #[serde(default, deserialize_with = "null_default")]
    pub timestamp: String,
    #[serde(default)]
    pub value: i64,
    #[serde(rename = "ValueInIA", default)]
    pub value_in_ia: i64,
    #[serde(default)]
    pub value_in_standard: i64,
}

/// A file system as returned by the v3 API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploEfs {
    #[serde(default, deserialize_with = "null_default")]
    pub creation_time: String,
    #[serde(default, deserialize_with = "null_default")]
    pub creation_token: String,
    #[serde(default, deserialize_with = "null_default")]
    pub encrypted: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub file_system_arn: String,
    #[serde(default, deserialize_with = "null_default")]
    pub file_system_id: String,
    #[serde(default)]
    pub life_cycle_state: Option<DuploStringValue>,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub number_of_mount_targets: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub owner_id: String,
    #[serde(default)]
    pub performance_mode: Option<DuploStringValue>,
    #[serde(default)]
    pub provisioned_throughput_in_mibps: f64,
    #[serde(default)]
    pub size_in_bytes: Option<DuploEfsSizeInBytes>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<DuploKeyStringValue>,
    #[serde(default)]
    pub throughput_mode: Option<DuploStringValue>,
}

impl DuploEfs {
    /// Lifecycle state value, empty when unknown
    pub fn state(&self) -> &str {
        self.life_cycle_state
            .as_ref()
            .map(|s| s.value.as_str())
            .unwrap_or_default()
    }

    pub fn is_available(&self) -> bool {
        self.state() == EFS_STATE_AVAILABLE
    }
}

/// One lifecycle rule; exactly one transition is normally set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploEfsLifecyclePolicy {
    #[serde(rename = "TransitionToArchive", default)]
    pub transition_to_archive: Option<DuploStringValue>,
    #[serde(rename = "TransitionToIA", default)]
    pub transition_to_ia: Option<DuploStringValue>,
    #[serde(rename = "TransitionToPrimaryStorageClass", default)]
    pub transition_to_primary_storage_class: Option<DuploStringValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploEfsLifecycleRequest {
    pub file_system_id: String,
    pub lifecycle_policies: Vec<DuploEfsLifecyclePolicy>,
}

impl DuploClient {
    // =========================================================================
    // EFS API helpers
    // =========================================================================

    pub async fn duplo_efs_create(&self, tenant_id: &str, rq: &DuploEfsCreateRequest) -> ClientResult<DuploEfs> {
        let efs: Option<DuploEfs> = self
            .post_api_with_retry(
                &format!("DuploEFSCreate({}, {})", tenant_id, rq.name),
                &format!("v3/subscriptions/{}/aws/efs", tenant_id),
                rq,
            )
            .await?;
        Ok(efs.unwrap_or_default())
    }

    pub async fn duplo_efs_update(&self, tenant_id: &str, rq: &DuploEfsUpdateRequest) -> ClientResult<DuploEfs> {
        let efs: Option<DuploEfs> = self
            .put_api_with_retry(
                &format!("DuploEFSUpdate({}, {})", tenant_id, rq.file_system_id),
                &format!("v3/subscriptions/{}/aws/efs", tenant_id),
                rq,
            )
            .await?;
        Ok(efs.unwrap_or_default())
    }

    pub async fn duplo_efs_get(&self, tenant_id: &str, efs_id: &str) -> ClientResult<Option<DuploEfs>> {
        self.get_api_with_retry(
            &format!("DuploEFSGet({}, {})", tenant_id, efs_id),
            &format!("v3/subscriptions/{}/aws/efs/{}", tenant_id, efs_id),
        )
        .await
    }

    pub async fn duplo_efs_delete(&self, tenant_id: &str, efs_id: &str) -> ClientResult<()> {
        let caller = format!("DELETE (DuploEFSDelete({}, {}))", tenant_id, efs_id);
        self.retry
            .run(&caller, || async {
                let _: Option<DuploEfs> = self
                    .delete_api(
                        &format!("DuploEFSDelete({}, {})", tenant_id, efs_id),
                        &format!("v3/subscriptions/{}/aws/efs/{}", tenant_id, efs_id),
                    )
                    .await?;
                Ok(())
            })
            .await
    }

    /// Replace the lifecycle policies of a file system
    pub async fn duplo_efs_lifecycle_policy_update(
        &self,
        tenant_id: &str,
        rq: &DuploEfsLifecycleRequest,
    ) -> ClientResult<()> {
        self.put_api_unit_with_retry(
            &format!("DuploEFSLifecyclePolicyUpdate({}, {})", tenant_id, rq.file_system_id),
            &format!("v3/subscriptions/{}/aws/efs/{}", tenant_id, rq.file_system_id),
            rq,
        )
        .await
    }

    pub async fn duplo_efs_lifecycle_policy_get(
        &self,
        tenant_id: &str,
        efs_id: &str,
    ) -> ClientResult<Vec<DuploEfsLifecyclePolicy>> {
        let list: Option<Vec<DuploEfsLifecyclePolicy>> = self
            .get_api_with_retry(
                &format!("DuploEFSLifecyclePolicyGet({}, {})", tenant_id, efs_id),
                &format!("v3/subscriptions/{}/aws/efs/{}/lifecyclePolicies", tenant_id, efs_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efs_state() {
        let efs: DuploEfs = serde_json::from_str(
            r#"{"FileSystemId":"fs-1","Name":"duploservices-dev-data","LifeCycleState":{"Value":"available"},"Tags":null}"#,
        )
        .unwrap();
        assert!(efs.is_available());

        let creating: DuploEfs =
            serde_json::from_str(r#"{"FileSystemId":"fs-1","LifeCycleState":{"Value":"creating"}}"#).unwrap();
        assert!(!creating.is_available());
        assert_eq!(DuploEfs::default().state(), "");
    }

    #[test]
    fn test_create_request_omits_zero_throughput() {
        let rq = DuploEfsCreateRequest {
            name: "data".into(),
            performance_mode: "generalPurpose".into(),
            throughput_mode: "bursting".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&rq).unwrap();
        assert!(json.get("ProvisionedThroughputInMibps").is_none());
        assert_eq!(json["Backup"], false);
    }

    #[test]
    fn test_lifecycle_request_wire_format() {
        let rq = DuploEfsLifecycleRequest {
            file_system_id: "fs-1".into(),
            lifecycle_policies: vec![DuploEfsLifecyclePolicy {
                transition_to_ia: Some(DuploStringValue::new("AFTER_30_DAYS")),
                ..Default::default()
            }],
        };
        assert_eq!(
            serde_json::to_value(&rq).unwrap(),
            serde_json::json!({
                "FileSystemId": "fs-1",
                "LifecyclePolicies": [{
                    "TransitionToArchive": null,
                    "TransitionToIA": {"Value": "AFTER_30_DAYS"},
                    "TransitionToPrimaryStorageClass": null
                }]
            })
        );
    }
}
