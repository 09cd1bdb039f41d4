//! GCP storage bucket API (v3)

use super::client::DuploClient;
use super::error::ClientResult;
use super::names::unwrap_name;
use super::types::null_default;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(v: &bool) -> bool {
    !*v
}

/// A GCP storage bucket owned by a tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploGcpStorageBucket {
    #[serde(skip)]
    pub tenant_id: String,
    /// Name without the tenant decoration
    #[serde(skip)]
    pub short_name: String,

    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "is_false")]
    pub enable_versioning: bool,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "is_false")]
    pub allow_public_access: bool,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl DuploClient {
    pub async fn gcp_storage_bucket_create(
        &self,
        tenant_id: &str,
        rq: &DuploGcpStorageBucket,
    ) -> ClientResult<DuploGcpStorageBucket> {
        let bucket: Option<DuploGcpStorageBucket> = self
            .post_api(
                &format!("GcpStorageBucketCreate({}, {})", tenant_id, rq.name),
                &format!("v3/subscriptions/{}/google/bucket", tenant_id),
                rq,
            )
            .await?;
        Ok(bucket.unwrap_or_default())
    }

    /// `rq.name` is the bucket fullname.
    pub async fn gcp_storage_bucket_update(
        &self,
        tenant_id: &str,
        rq: &DuploGcpStorageBucket,
    ) -> ClientResult<DuploGcpStorageBucket> {
        let bucket: Option<DuploGcpStorageBucket> = self
            .put_api(
                &format!("GcpStorageBucketUpdate({}, {})", tenant_id, rq.name),
                &format!("v3/subscriptions/{}/google/bucket/{}", tenant_id, rq.name),
                rq,
            )
            .await?;
        Ok(bucket.unwrap_or_default())
    }

    pub async fn gcp_storage_bucket_delete(&self, tenant_id: &str, fullname: &str) -> ClientResult<()> {
        self.delete_api_unit(
            &format!("GcpStorageBucketDelete({}, {})", tenant_id, fullname),
            &format!("v3/subscriptions/{}/google/bucket/{}", tenant_id, fullname),
        )
        .await
    }

    /// List buckets, deriving each short name from the tenant prefix and project ID
    pub async fn gcp_storage_bucket_list(&self, tenant_id: &str) -> ClientResult<Vec<DuploGcpStorageBucket>> {
        let prefix = self.get_duplo_services_prefix(tenant_id).await?;
        let project_id = self.tenant_get_gcp_project_id(tenant_id).await?;

        let list: Option<Vec<DuploGcpStorageBucket>> = self
            .get_api(
                &format!("GcpStorageBucketGetList({})", tenant_id),
                &format!("v3/subscriptions/{}/google/bucket", tenant_id),
            )
            .await?;
        Ok(list
            .unwrap_or_default()
            .into_iter()
            .map(|mut bucket| {
                bucket.tenant_id = tenant_id.to_string();
                bucket.short_name = unwrap_name(&prefix, &project_id, &bucket.name, false).unwrap_or_default();
                bucket
            })
            .collect())
    }

    /// Get a bucket by fullname; `short_name` is recorded on the result
    pub async fn gcp_storage_bucket_get(
        &self,
        tenant_id: &str,
        fullname: &str,
        short_name: &str,
    ) -> ClientResult<Option<DuploGcpStorageBucket>> {
        let bucket: Option<DuploGcpStorageBucket> = self
            .get_api(
                &format!("GcpStorageBucketGet({}, {})", tenant_id, fullname),
                &format!("v3/subscriptions/{}/google/bucket/{}", tenant_id, fullname),
            )
            .await?;
        Ok(bucket.map(|mut b| {
            b.tenant_id = tenant_id.to_string();
            b.short_name = short_name.to_string();
            b
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_skips_synthesized_fields() {
        let bucket = DuploGcpStorageBucket {
            tenant_id: "t1".into(),
            short_name: "assets".into(),
            name: "assets".into(),
            enable_versioning: true,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&bucket).unwrap(),
            serde_json::json!({"Name": "assets", "EnableVersioning": true})
        );
    }

    #[test]
    fn test_bucket_decodes_null_labels() {
        let bucket: DuploGcpStorageBucket =
            serde_json::from_str(r#"{"Name":"b","Labels":null,"Status":"READY"}"#).unwrap();
        assert!(bucket.labels.is_empty());
        assert_eq!(bucket.status, "READY");
    }
}
