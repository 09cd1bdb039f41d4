//! AWS cloud resources and S3 buckets
//!
//! Older backends only expose S3 buckets through the generic cloud resource
//! listing (`GetCloudResources`) and `S3BucketUpdate`; newer ones serve the
//! v3 `aws/s3bucket` endpoints. Both are supported here.

use super::client::DuploClient;
use super::error::ClientResult;
use super::names::DUPLO_SERVICES_PREFIX;
use super::types::{null_default, DuploKeyStringValue};
use serde::{Deserialize, Serialize};

/// Cloud resource type of an S3 bucket in the generic listing
pub const RESOURCE_TYPE_S3_BUCKET: i32 = 1;

/// A generic AWS cloud resource owned by a tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploAwsCloudResource {
    #[serde(skip)]
    pub tenant_id: String,

    #[serde(rename = "ResourceType", default)]
    pub resource_type: i32,
    #[serde(rename = "Name", default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "Arn", default, deserialize_with = "null_default")]
    pub arn: String,
    #[serde(rename = "MetaData", default, deserialize_with = "null_default")]
    pub meta_data: String,
}

/// An S3 bucket with its Duplo-managed settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploS3Bucket {
    #[serde(skip)]
    pub tenant_id: String,

    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub arn: String,
    #[serde(default, deserialize_with = "null_default")]
    pub domain_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub enable_versioning: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub enable_access_logs: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub allow_public_access: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub default_encryption: String,
    #[serde(default, deserialize_with = "null_default")]
    pub policies: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<DuploKeyStringValue>,
    #[serde(default, deserialize_with = "null_default")]
    pub region: String,
}

/// Legacy create/delete request for `S3BucketUpdate`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuploS3BucketRequest {
    #[serde(rename = "ResourceType")]
    pub resource_type: i32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "State", skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(rename = "InTenantRegion")]
    pub in_tenant_region: bool,
}

/// Settings applied to a bucket (v3 create/update and legacy settings)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploS3BucketSettingsRequest {
    pub name: String,
    pub enable_versioning: bool,
    pub enable_access_logs: bool,
    pub allow_public_access: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_encryption: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
}

impl DuploClient {
    // =========================================================================
    // Generic cloud resource API helpers
    // =========================================================================

    pub async fn tenant_list_aws_cloud_resources(&self, tenant_id: &str) -> ClientResult<Vec<DuploAwsCloudResource>> {
        let list: Option<Vec<DuploAwsCloudResource>> = self
            .get_api(
                &format!("TenantListAwsCloudResources({})", tenant_id),
                &format!("subscriptions/{}/GetCloudResources", tenant_id),
            )
            .await?;
        Ok(list
            .unwrap_or_default()
            .into_iter()
            .map(|mut resource| {
                resource.tenant_id = tenant_id.to_string();
                resource
            })
            .collect())
    }

    /// Find a cloud resource by type and exact name
    pub async fn tenant_get_aws_cloud_resource(
        &self,
        tenant_id: &str,
        resource_type: i32,
        name: &str,
    ) -> ClientResult<Option<DuploAwsCloudResource>> {
        let list = self.tenant_list_aws_cloud_resources(tenant_id).await?;
        Ok(list
            .into_iter()
            .find(|r| r.resource_type == resource_type && r.name == name))
    }

    // =========================================================================
    // Legacy S3 API helpers
    // =========================================================================

    /// `duploservices-<tenant account>-<name>-<aws account>`
    pub async fn tenant_get_s3_bucket_full_name(&self, tenant_id: &str, name: &str) -> ClientResult<String> {
        let account_id = self.tenant_get_aws_account_id(tenant_id).await?;
        let account_name = self
            .get_tenant_for_user(tenant_id)
            .await?
            .map(|t| t.account_name)
            .unwrap_or_default();
        Ok(format!(
            "{}-{}-{}-{}",
            DUPLO_SERVICES_PREFIX, account_name, name, account_id
        ))
    }

    /// Look up a bucket by short name in the cloud resource listing
    pub async fn tenant_get_s3_bucket(&self, tenant_id: &str, name: &str) -> ClientResult<Option<DuploS3Bucket>> {
        let full_name = self.tenant_get_s3_bucket_full_name(tenant_id, name).await?;
        let resource = self
            .tenant_get_aws_cloud_resource(tenant_id, RESOURCE_TYPE_S3_BUCKET, &full_name)
            .await?;
        Ok(resource.map(|r| DuploS3Bucket {
            tenant_id: tenant_id.to_string(),
            arn: format!("arn:aws:s3:::{}", r.name),
            name: r.name,
            ..Default::default()
        }))
    }

    pub async fn tenant_create_s3_bucket(&self, tenant_id: &str, rq: &DuploS3BucketRequest) -> ClientResult<()> {
        let rq = DuploS3BucketRequest {
            resource_type: RESOURCE_TYPE_S3_BUCKET,
            ..rq.clone()
        };
        self.post_api_unit(
            &format!("TenantCreateS3Bucket({}, {})", tenant_id, rq.name),
            &format!("subscriptions/{}/S3BucketUpdate", tenant_id),
            &rq,
        )
        .await
    }

    pub async fn tenant_delete_s3_bucket(&self, tenant_id: &str, name: &str) -> ClientResult<()> {
        let full_name = self.tenant_get_s3_bucket_full_name(tenant_id, name).await?;
        let rq = DuploS3BucketRequest {
            resource_type: RESOURCE_TYPE_S3_BUCKET,
            name: full_name,
            state: "delete".to_string(),
            in_tenant_region: false,
        };
        self.post_api_unit(
            &format!("TenantDeleteS3Bucket({}, {})", tenant_id, name),
            &format!("subscriptions/{}/S3BucketUpdate", tenant_id),
            &rq,
        )
        .await
    }

    /// Bucket settings from the legacy settings API
    pub async fn tenant_get_s3_bucket_settings(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> ClientResult<Option<DuploS3Bucket>> {
        let full_name = self.tenant_get_s3_bucket_full_name(tenant_id, name).await?;
        let bucket: Option<DuploS3Bucket> = self
            .get_api(
                &format!("TenantGetS3BucketSettings({}, {})", tenant_id, name),
                &format!("subscriptions/{}/GetS3BucketSettings/{}", tenant_id, full_name),
            )
            .await?;
        Ok(bucket.map(|mut b| {
            b.tenant_id = tenant_id.to_string();
            b
        }))
    }

    /// Apply settings through the legacy settings API
    ///
    /// `rq.name` is the short bucket name.
    pub async fn tenant_apply_s3_bucket_settings(
        &self,
        tenant_id: &str,
        rq: &DuploS3BucketSettingsRequest,
    ) -> ClientResult<DuploS3Bucket> {
        let full_name = self.tenant_get_s3_bucket_full_name(tenant_id, &rq.name).await?;
        let rq = DuploS3BucketSettingsRequest {
            name: full_name,
            ..rq.clone()
        };
        let bucket: Option<DuploS3Bucket> = self
            .post_api(
                &format!("TenantApplyS3BucketSettings({}, {})", tenant_id, rq.name),
                &format!("subscriptions/{}/ApplyS3BucketSettings", tenant_id),
                &rq,
            )
            .await?;
        let mut bucket = bucket.unwrap_or_default();
        bucket.tenant_id = tenant_id.to_string();
        Ok(bucket)
    }

    // =========================================================================
    // S3 v3 API helpers
    // =========================================================================

    pub async fn tenant_get_v3_s3_bucket(&self, tenant_id: &str, full_name: &str) -> ClientResult<Option<DuploS3Bucket>> {
        let bucket: Option<DuploS3Bucket> = self
            .get_api(
                &format!("TenantGetV3S3Bucket({}, {})", tenant_id, full_name),
                &format!("v3/subscriptions/{}/aws/s3bucket/{}", tenant_id, full_name),
            )
            .await?;
        Ok(bucket.map(|mut b| {
            b.tenant_id = tenant_id.to_string();
            b
        }))
    }

    pub async fn tenant_create_v3_s3_bucket(
        &self,
        tenant_id: &str,
        rq: &DuploS3BucketSettingsRequest,
    ) -> ClientResult<Option<DuploS3Bucket>> {
        self.post_api(
            &format!("TenantCreateV3S3Bucket({}, {})", tenant_id, rq.name),
            &format!("v3/subscriptions/{}/aws/s3bucket", tenant_id),
            rq,
        )
        .await
    }

    /// `rq.name` is the bucket fullname.
    pub async fn tenant_update_v3_s3_bucket(
        &self,
        tenant_id: &str,
        rq: &DuploS3BucketSettingsRequest,
    ) -> ClientResult<DuploS3Bucket> {
        let bucket: Option<DuploS3Bucket> = self
            .put_api(
                &format!("TenantUpdateV3S3Bucket({}, {})", tenant_id, rq.name),
                &format!("v3/subscriptions/{}/aws/s3bucket/{}", tenant_id, rq.name),
                rq,
            )
            .await?;
        let mut bucket = bucket.unwrap_or_default();
        bucket.tenant_id = tenant_id.to_string();
        Ok(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_request_wire_format() {
        let rq = DuploS3BucketRequest {
            resource_type: RESOURCE_TYPE_S3_BUCKET,
            name: "logs".into(),
            state: String::new(),
            in_tenant_region: true,
        };
        assert_eq!(
            serde_json::to_value(&rq).unwrap(),
            serde_json::json!({"ResourceType": 1, "Name": "logs", "InTenantRegion": true})
        );
    }

    #[test]
    fn test_settings_request_omits_empty_fields() {
        let rq = DuploS3BucketSettingsRequest {
            name: "duploservices-dev-logs-1234".into(),
            enable_versioning: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&rq).unwrap();
        assert_eq!(json["EnableVersioning"], true);
        assert!(json.get("Policies").is_none());
        assert!(json.get("Region").is_none());
    }

    #[test]
    fn test_bucket_decodes_null_lists() {
        let bucket: DuploS3Bucket = serde_json::from_str(
            r#"{"Name":"b","Policies":null,"Tags":null,"DefaultEncryption":"Sse"}"#,
        )
        .unwrap();
        assert!(bucket.policies.is_empty());
        assert_eq!(bucket.default_encryption, "Sse");
    }
}
