//! Tenant secrets (AWS Secrets Manager) API

use super::client::DuploClient;
use super::error::ClientResult;
use super::types::{null_default, DuploKeyStringValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// A secret owned by a tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenantSecret {
    /// Not returned by the backend; filled in by the client
    #[serde(skip)]
    pub tenant_id: String,

    #[serde(rename = "ARN", default, deserialize_with = "null_default")]
    pub arn: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub rotation_enabled: bool,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "HashMap::is_empty")]
    pub secret_versions_to_stages: HashMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<DuploKeyStringValue>,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub created_date: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub last_changed_date: String,
}

impl DuploTenantSecret {
    /// The user-supplied part of `duploservices-<tenant>-<suffix>`
    pub fn name_suffix(&self) -> Option<&str> {
        secret_name_suffix(&self.name)
    }
}

/// Third `-`-separated component of a secret name
pub fn secret_name_suffix(name: &str) -> Option<&str> {
    let mut parts = name.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(suffix)) => Some(suffix),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenantSecretRequest {
    pub name: String,
    pub secret_string: String,
}

impl DuploClient {
    pub async fn tenant_list_secrets(&self, tenant_id: &str) -> ClientResult<Vec<DuploTenantSecret>> {
        let list: Option<Vec<DuploTenantSecret>> = self
            .get_api(
                &format!("TenantListSecrets({})", tenant_id),
                &format!("subscriptions/{}/ListTenantSecrets", tenant_id),
            )
            .await?;
        Ok(list
            .unwrap_or_default()
            .into_iter()
            .map(|mut secret| {
                secret.tenant_id = tenant_id.to_string();
                secret
            })
            .collect())
    }

    pub async fn tenant_get_secret_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> ClientResult<Option<DuploTenantSecret>> {
        let list = self.tenant_list_secrets(tenant_id).await?;
        Ok(list.into_iter().find(|s| s.name == name))
    }

    pub async fn tenant_get_secret_by_name_suffix(
        &self,
        tenant_id: &str,
        name_suffix: &str,
    ) -> ClientResult<Option<DuploTenantSecret>> {
        let list = self.tenant_list_secrets(tenant_id).await?;
        Ok(list
            .into_iter()
            .find(|s| s.name_suffix() == Some(name_suffix)))
    }

    pub async fn tenant_create_secret(&self, tenant_id: &str, rq: &DuploTenantSecretRequest) -> ClientResult<()> {
        self.post_api_unit(
            &format!("TenantCreateSecret({}, {})", tenant_id, rq.name),
            &format!("subscriptions/{}/CreateTenantSecret", tenant_id),
            rq,
        )
        .await
    }

    pub async fn tenant_delete_secret(&self, tenant_id: &str, name: &str) -> ClientResult<()> {
        self.post_api_unit(
            &format!("TenantDeleteSecret({}, {})", tenant_id, name),
            &format!("subscriptions/{}/deleteTenantSecret", tenant_id),
            &json!({
                "ForceDeleteWithoutRecovery": true,
                "SecretId": name,
            }),
        )
        .await
    }
}
