//! Resource naming conventions
//!
//! DuploCloud decorates user-supplied short names with the tenant account
//! name and, for some clouds, the account or project ID:
//! `duploservices-<tenant account>-<name>[-<account id>]` ("fullname").

use super::client::DuploClient;
use super::error::{ClientError, ClientResult};
use super::tenant::DuploTenant;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Prefix used for every tenant-scoped resource
pub const DUPLO_SERVICES_PREFIX: &str = "duploservices";

const SLASH_PLACEHOLDER: &str = "_SLASH_";

/// Bytes escaped in a single path segment: everything but the unreserved
/// characters and the sub-delimiters allowed inside a segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Escape a path parameter that may itself contain slashes
///
/// The value is escaped twice because the platform unescapes once before routing.
pub fn encode_path_param(param: &str) -> String {
    let once = utf8_percent_encode(param, PATH_SEGMENT).to_string();
    utf8_percent_encode(&once, PATH_SEGMENT).to_string()
}

/// Remove a `<prefix>-` decoration from a name
pub fn unprefix_name(prefix: &str, name: &str) -> Option<String> {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.get(1..))
        .map(str::to_string)
}

/// Remove both the `<prefix>-` decoration and the `-<account id>` suffix
///
/// When `optional_account_id` is set a missing suffix is tolerated.
pub fn unwrap_name(prefix: &str, account_id: &str, name: &str, optional_account_id: bool) -> Option<String> {
    let suffix = format!("-{}", account_id);
    let part = match name.strip_suffix(&suffix) {
        Some(part) => part,
        None if optional_account_id => name,
        None => return None,
    };
    unprefix_name(prefix, part)
}

/// Replace `/` so the value can be embedded in a resource ID
pub fn encode_slash_in_id_part(name: &str) -> String {
    name.replace('/', SLASH_PLACEHOLDER)
}

pub fn decode_slash_in_id_part(name: &str) -> String {
    name.replace(SLASH_PLACEHOLDER, "/")
}

fn join_name(parts: &[&str]) -> String {
    parts.join("-")
}

impl DuploClient {
    async fn tenant_for_naming(&self, tenant_id: &str) -> ClientResult<DuploTenant> {
        self.get_tenant_for_user(tenant_id)
            .await?
            .ok_or_else(|| ClientError::with_status(format!("tenant '{}' not found", tenant_id), 404, ""))
    }

    /// Build `<prefix>-<tenant>-<name>`, optionally suffixed with the AWS account ID
    pub async fn get_resource_name(
        &self,
        prefix: &str,
        tenant_id: &str,
        name: &str,
        with_account_suffix: bool,
    ) -> ClientResult<String> {
        let tenant = self.tenant_for_naming(tenant_id).await?;
        if with_account_suffix {
            let account_id = self.tenant_get_aws_account_id(tenant_id).await?;
            return Ok(join_name(&[prefix, &tenant.account_name, name, &account_id]));
        }
        Ok(join_name(&[prefix, &tenant.account_name, name]))
    }

    pub async fn get_duplo_services_name(&self, tenant_id: &str, name: &str) -> ClientResult<String> {
        self.get_resource_name(DUPLO_SERVICES_PREFIX, tenant_id, name, false)
            .await
    }

    /// Fullname including the AWS account ID suffix
    pub async fn get_duplo_services_name_with_aws(&self, tenant_id: &str, name: &str) -> ClientResult<String> {
        self.get_resource_name(DUPLO_SERVICES_PREFIX, tenant_id, name, true)
            .await
    }

    /// Fullname including the GCP project ID suffix
    pub async fn get_duplo_services_name_with_gcp(&self, tenant_id: &str, name: &str) -> ClientResult<String> {
        let tenant = self.tenant_for_naming(tenant_id).await?;
        let project_id = self.tenant_get_gcp_project_id(tenant_id).await?;
        Ok(join_name(&[DUPLO_SERVICES_PREFIX, &tenant.account_name, name, &project_id]))
    }

    /// `duploservices-<tenant account>`
    pub async fn get_duplo_services_prefix(&self, tenant_id: &str) -> ClientResult<String> {
        let tenant = self
            .tenant_get_v3(tenant_id)
            .await?
            .ok_or_else(|| ClientError::with_status(format!("tenant '{}' not found", tenant_id), 404, ""))?;
        Ok(join_name(&[DUPLO_SERVICES_PREFIX, &tenant.account_name]))
    }
}
