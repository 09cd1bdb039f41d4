//! DuploCloud Client
//!
//! Main client for the DuploCloud REST API. Endpoint groups (tenants,
//! secrets, SQS, EFS, ...) are implemented as `impl DuploClient` blocks in
//! sibling modules; this module owns request building, response decoding
//! and logging.

use super::error::{ClientError, ClientResult};
use super::http::{sanitize_for_log, DuploHttpClient, HttpOptions};
use super::retry::RetryConf;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// APIs whose response bodies carry secret material and are never logged
const UNLOGGED_APIS: &[&str] = &[
    "K8SecretGetList",
    "SsmParameterGet",
    "SsmParameterList",
    "TenantListSecrets",
];

/// Main DuploCloud client
#[derive(Clone)]
pub struct DuploClient {
    pub http: DuploHttpClient,
    pub host_url: String,
    pub retry: RetryConf,
}

impl std::fmt::Debug for DuploClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuploClient")
            .field("host_url", &self.host_url)
            .finish_non_exhaustive()
    }
}

impl DuploClient {
    /// Create a new client with default transport settings
    pub fn new(host: &str, token: &str) -> ClientResult<Self> {
        Self::with_options(host, token, &HttpOptions::default())
    }

    /// Create a new client; both `host` and `token` are required
    pub fn with_options(host: &str, token: &str, options: &HttpOptions) -> ClientResult<Self> {
        if host.is_empty() || token.is_empty() {
            return Err(ClientError::new(
                "missing provider config for 'duplo_token' 'duplo_host'. Not defined in environment var / main.tf",
            ));
        }

        let http = DuploHttpClient::new(token, options)?;

        Ok(Self {
            http,
            host_url: host.trim_end_matches('/').to_string(),
            retry: RetryConf::default(),
        })
    }

    /// Replace the rate-limit retry settings
    pub fn with_retry(mut self, retry: RetryConf) -> Self {
        self.retry = retry;
        self
    }

    /// Build an absolute API URL
    pub fn url(&self, api_path: &str) -> String {
        format!("{}/{}", self.host_url, api_path)
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    /// Call an API and return the raw response body
    async fn do_api<Rq: Serialize + ?Sized>(
        &self,
        method: Method,
        api_name: &str,
        api_path: &str,
        rq: Option<&Rq>,
        expected_status: Option<u16>,
    ) -> ClientResult<(String, String)> {
        let api_name = format!("{}API {}", method.as_str().to_lowercase(), api_name);
        let url = self.url(api_path);

        let body = match rq {
            Some(rq) => {
                let body = serde_json::to_string(rq).map_err(|e| {
                    let message = format!("{}: cannot marshal request to JSON: {}", api_name, e);
                    tracing::trace!("{}", message);
                    ClientError::request(&url, message)
                })?;
                tracing::trace!("{}: prepared request: {} <= ({})", api_name, url, body);
                Some(body)
            }
            None => {
                tracing::trace!("{}: prepared request: {}", api_name, url);
                None
            }
        };

        let response = self
            .http
            .send(method, &url, body, expected_status)
            .await
            .map_err(|e| {
                tracing::trace!("{}: failed: {}", api_name, e);
                e
            })?;

        if UNLOGGED_APIS.iter().any(|name| api_name.contains(name)) {
            tracing::trace!("{}: received response ({} bytes)", api_name, response.len());
        } else {
            tracing::trace!(
                "{}: received response: {}",
                api_name,
                sanitize_for_log(&response)
            );
        }

        Ok((api_name, response))
    }

    fn decode<Rp: DeserializeOwned>(&self, api_name: &str, api_path: &str, body: &str) -> ClientResult<Rp> {
        let body = if body.trim().is_empty() { "null" } else { body };
        serde_json::from_str(body).map_err(|e| {
            let message = format!("{}: cannot unmarshal response from JSON: {}", api_name, e);
            tracing::trace!("{}", message);
            ClientError::app(&self.url(api_path), message)
        })
    }

    fn expect_null(&self, api_name: &str, api_path: &str, body: &str) -> ClientResult<()> {
        tracing::trace!("{}: expected null response", api_name);
        if body == "null" || body.is_empty() || body == "\"\"" {
            return Ok(());
        }
        let message = format!("{}: received unexpected response: {}", api_name, body);
        tracing::trace!("{}", message);
        Err(ClientError::app(&self.url(api_path), message))
    }

    /// GET an API and decode the JSON response
    pub async fn get_api<Rp: DeserializeOwned>(&self, api_name: &str, api_path: &str) -> ClientResult<Rp> {
        let (name, body) = self
            .do_api::<()>(Method::GET, api_name, api_path, None, None)
            .await?;
        self.decode(&name, api_path, &body)
    }

    /// DELETE an API and decode the JSON response
    pub async fn delete_api<Rp: DeserializeOwned>(&self, api_name: &str, api_path: &str) -> ClientResult<Rp> {
        let (name, body) = self
            .do_api::<()>(Method::DELETE, api_name, api_path, None, None)
            .await?;
        self.decode(&name, api_path, &body)
    }

    /// DELETE an API that answers with an empty body
    pub async fn delete_api_unit(&self, api_name: &str, api_path: &str) -> ClientResult<()> {
        let (name, body) = self
            .do_api::<()>(Method::DELETE, api_name, api_path, None, None)
            .await?;
        self.expect_null(&name, api_path, &body)
    }

    /// DELETE an API that must answer with exactly `expected_status`
    pub async fn delete_api_with_status(
        &self,
        api_name: &str,
        api_path: &str,
        expected_status: u16,
    ) -> ClientResult<()> {
        self.do_api::<()>(Method::DELETE, api_name, api_path, None, Some(expected_status))
            .await
            .map(|_| ())
    }

    /// POST a JSON request and decode the JSON response
    pub async fn post_api<Rq: Serialize + ?Sized, Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<Rp> {
        let (name, body) = self
            .do_api(Method::POST, api_name, api_path, Some(rq), None)
            .await?;
        self.decode(&name, api_path, &body)
    }

    /// POST a JSON request to an API that answers with an empty body
    pub async fn post_api_unit<Rq: Serialize + ?Sized>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<()> {
        let (name, body) = self
            .do_api(Method::POST, api_name, api_path, Some(rq), None)
            .await?;
        self.expect_null(&name, api_path, &body)
    }

    /// PUT a JSON request and decode the JSON response
    pub async fn put_api<Rq: Serialize + ?Sized, Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<Rp> {
        let (name, body) = self
            .do_api(Method::PUT, api_name, api_path, Some(rq), None)
            .await?;
        self.decode(&name, api_path, &body)
    }

    /// PUT a JSON request to an API that answers with an empty body
    pub async fn put_api_unit<Rq: Serialize + ?Sized>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<()> {
        let (name, body) = self
            .do_api(Method::PUT, api_name, api_path, Some(rq), None)
            .await?;
        self.expect_null(&name, api_path, &body)
    }
}
