//! HTTP transport for DuploCloud REST API calls

use super::error::{ClientError, ClientResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_LOG_BODY_LENGTH) {
        Some((idx, _)) => format!(
            "{}... [truncated, {} bytes total]",
            &body[..idx],
            body.len()
        ),
        None => body.to_string(),
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Transport settings taken from the provider configuration
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub insecure_skip_verify: bool,
    /// Sent as the `DuploUser` header when set
    pub user_account: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            insecure_skip_verify: false,
            user_account: None,
        }
    }
}

/// Authenticated HTTP client for DuploCloud API calls
#[derive(Clone)]
pub struct DuploHttpClient {
    client: Client,
}

impl DuploHttpClient {
    /// Create a new HTTP client sending `token` as a bearer credential
    pub fn new(token: &str, options: &HttpOptions) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::new(format!("invalid duplo_token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        if let Some(user) = options.user_account.as_deref().filter(|u| !u.is_empty()) {
            let value = HeaderValue::from_str(user)
                .map_err(|e| ClientError::new(format!("invalid user_account: {}", e)))?;
            headers.insert("DuploUser", value);
        }

        let client = Client::builder()
            .user_agent(concat!("terraform-provider-duplocloud/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify)
            .build()
            .map_err(|e| ClientError::new(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Send a request and return the raw response body
    ///
    /// Any status above 300, or a status different from `expected_status`
    /// when one is given, is turned into a [`ClientError`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        expected_status: Option<u16>,
    ) -> ClientResult<String> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ClientError::request(url, format!("cannot build request: {}", e)))?;
        let path = parsed.path().to_string();

        let mut request = self.client.request(method, parsed);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| ClientError::io(url, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let unexpected = status.as_u16() > 300
            || expected_status.is_some_and(|expected| expected != status.as_u16());

        if unexpected {
            let body = response.text().await.ok();
            tracing::error!(
                "API error: {} - {}",
                status,
                sanitize_for_log(body.as_deref().unwrap_or_default())
            );
            return Err(ClientError::from_response(
                url,
                &path,
                status.as_u16(),
                content_type.as_deref(),
                body.as_deref(),
            ));
        }

        response.text().await.map_err(|e| {
            tracing::trace!("duplo-doRequest: {}", e);
            ClientError::io(url, e)
        })
    }
}
