//! Tenant and admin APIs

use super::client::DuploClient;
use super::error::ClientResult;
use super::types::{null_default, DuploInfrastructure, DuploKeyStringValue, DuploSystemFeatures};
use serde::{Deserialize, Serialize};

/// A DuploCloud tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenant {
    #[serde(
        rename = "TenantId",
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub tenant_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub account_name: String,
    #[serde(rename = "PlanID", default, deserialize_with = "null_default")]
    pub plan_id: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub existing_k8s_namespace: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub infra_owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_policy: Option<DuploTenantPolicy>,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<DuploKeyStringValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenantPolicy {
    #[serde(default)]
    pub allow_volume_mapping: bool,
    #[serde(default)]
    pub block_external_ep: bool,
}

impl DuploClient {
    // =========================================================================
    // Tenant API helpers
    // =========================================================================

    /// List the tenants visible to the calling user
    pub async fn list_tenants_for_user(&self) -> ClientResult<Vec<DuploTenant>> {
        let list: Option<Vec<DuploTenant>> = self
            .get_api("ListTenantsForUser()", "admin/GetTenantsForUser")
            .await?;
        Ok(list.unwrap_or_default())
    }

    /// List the tenants visible to the calling user, optionally restricted to one plan
    pub async fn list_tenants_for_user_by_plan(&self, plan_id: &str) -> ClientResult<Vec<DuploTenant>> {
        let list = self.list_tenants_for_user().await?;
        if plan_id.is_empty() {
            return Ok(list);
        }
        Ok(list.into_iter().filter(|t| t.plan_id == plan_id).collect())
    }

    /// Get a tenant by ID from the user's tenant list
    pub async fn get_tenant_for_user(&self, tenant_id: &str) -> ClientResult<Option<DuploTenant>> {
        let list = self.list_tenants_for_user().await?;
        Ok(list.into_iter().find(|t| t.tenant_id == tenant_id))
    }

    /// Get a tenant by account name from the user's tenant list
    pub async fn get_tenant_by_name_for_user(&self, name: &str) -> ClientResult<Option<DuploTenant>> {
        let list = self.list_tenants_for_user().await?;
        Ok(list.into_iter().find(|t| t.account_name == name))
    }

    pub async fn tenant_get_v3(&self, tenant_id: &str) -> ClientResult<Option<DuploTenant>> {
        self.get_api(
            &format!("TenantGetV3({})", tenant_id),
            &format!("v3/admin/tenant/{}", tenant_id),
        )
        .await
    }

    pub async fn tenant_create(&self, rq: &DuploTenant) -> ClientResult<()> {
        self.post_api_unit(&format!("TenantCreate({})", rq.account_name), "admin/AddTenant", rq)
            .await
    }

    pub async fn tenant_delete(&self, tenant_id: &str) -> ClientResult<()> {
        self.post_api_unit(
            &format!("TenantDelete({})", tenant_id),
            &format!("admin/DeleteTenant/{}", tenant_id),
            &(),
        )
        .await
    }

    /// AWS account backing a tenant
    pub async fn tenant_get_aws_account_id(&self, tenant_id: &str) -> ClientResult<String> {
        let account: Option<String> = self
            .get_api(
                &format!("TenantGetAwsAccountID({})", tenant_id),
                &format!("subscriptions/{}/GetAwsAccountId", tenant_id),
            )
            .await?;
        Ok(account.unwrap_or_default())
    }

    /// GCP project backing a tenant
    pub async fn tenant_get_gcp_project_id(&self, tenant_id: &str) -> ClientResult<String> {
        let project: Option<String> = self
            .get_api(
                &format!("TenantGetGcpProjectID({})", tenant_id),
                &format!("subscriptions/{}/GetGcpProjectId", tenant_id),
            )
            .await?;
        Ok(project.unwrap_or_default())
    }

    // =========================================================================
    // Admin API helpers
    // =========================================================================

    /// AWS account of the DuploCloud installation
    pub async fn get_aws_account_id(&self) -> ClientResult<String> {
        let account: Option<String> = self
            .get_api("GetAwsAccountID()", "adminproxy/GetAwsAccountId")
            .await?;
        Ok(account.unwrap_or_default())
    }

    pub async fn admin_get_system_features(&self) -> ClientResult<Option<DuploSystemFeatures>> {
        self.get_api("AdminGetSystemFeatures()", "v3/features/system")
            .await
    }

    pub async fn infrastructure_get_config(&self, name: &str) -> ClientResult<Option<DuploInfrastructure>> {
        self.get_api(
            &format!("InfrastructureGetConfig({})", name),
            &format!("v2/admin/InfrastructureV2/{}", name),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_serializes_wire_names() {
        let tenant = DuploTenant {
            account_name: "dev".into(),
            plan_id: "default".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&tenant).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"AccountName": "dev", "PlanID": "default"})
        );
    }

    #[test]
    fn test_tenant_decodes_nulls() {
        let tenant: DuploTenant = serde_json::from_str(
            r#"{"TenantId":"t1","AccountName":"dev","PlanID":"p","Tags":null,"TenantPolicy":null,"InfraOwner":null}"#,
        )
        .unwrap();
        assert_eq!(tenant.tenant_id, "t1");
        assert!(tenant.tags.is_empty());
        assert!(tenant.tenant_policy.is_none());
    }
}
