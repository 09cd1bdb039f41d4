//! DuploCloud API errors
//!
//! Every failure of a remote call is reported as a [`ClientError`]. The
//! status is the HTTP status code, or `-1` when no usable response was
//! received (transport failures, request encoding, unexpected bodies).

use serde_json::{Map, Value};
use thiserror::Error;

/// Message returned by the platform when AWS throttles a request
pub const RATE_EXCEEDED_MSG: &str = "Rate exceeded";

/// Error returned by every DuploCloud API call
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    message: String,
    status: i32,
    url: String,
    response: Map<String, Value>,
}

impl ClientError {
    /// Application error not tied to any request
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(message, -1, "")
    }

    /// Error with an explicit status, used when callers synthesize HTTP-like failures
    pub fn with_status(message: impl Into<String>, status: i32, url: impl Into<String>) -> Self {
        let message = message.into();
        let mut response = Map::new();
        response.insert("Message".to_string(), Value::String(message.clone()));
        Self {
            message,
            status,
            url: url.into(),
            response,
        }
    }

    /// Error encountered before the request could be sent
    pub(crate) fn request(url: &str, message: impl Into<String>) -> Self {
        Self::with_status(message, -1, url)
    }

    /// Error encountered while sending or reading the response
    pub(crate) fn io(url: &str, err: impl std::fmt::Display) -> Self {
        Self::with_status(err.to_string(), -1, url)
    }

    /// Semantically valid response that the caller could not use
    pub(crate) fn app(url: &str, message: impl Into<String>) -> Self {
        Self::with_status(message, -1, url)
    }

    /// Build an error from a non-successful HTTP response
    ///
    /// Legacy (non `/v3/`) endpoints answer 400/404 without a useful body,
    /// so the message gets a hint appended. JSON bodies are decoded into
    /// [`ClientError::response`]; a `Message` key is always present.
    pub(crate) fn from_response(
        url: &str,
        path: &str,
        status: u16,
        content_type: Option<&str>,
        body: Option<&str>,
    ) -> Self {
        let mut message = body.unwrap_or("(read of body failed)").to_string();

        if !path.starts_with("/v3/") && (status == 400 || status == 404) {
            message = format!("{}. Please verify object exists in duplocloud.", message);
        }

        let mut response = Map::new();
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if mime == "application/json" {
            match body.map(serde_json::from_str::<Map<String, Value>>) {
                Some(Ok(parsed)) => response = parsed,
                Some(Err(e)) => tracing::trace!(
                    "duplo-responseHttpError: failed to parse error response JSON: {}",
                    e
                ),
                None => {}
            }
        }

        let message = format!("url: {}, status: {}, message: {}", url, status, message);
        tracing::trace!("duplo-responseHttpError: {}", message);

        response
            .entry("Message")
            .or_insert_with(|| Value::String(message.clone()));

        Self {
            message,
            status: i32::from(status),
            url: url.to_string(),
            response,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, or -1 when no HTTP response was involved
    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decoded JSON error body
    pub fn response(&self) -> &Map<String, Value> {
        &self.response
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// The endpoint may not exist on this platform version
    pub fn possible_missing_api(&self) -> bool {
        self.status == 500 || self.status == 404
    }

    pub fn is_rate_exceeded(&self) -> bool {
        self.response_message() == Some(RATE_EXCEEDED_MSG)
    }

    /// Transient backend failures surfaced as HRESULT errors or empty 400s
    pub fn is_400_or_timeout(&self) -> bool {
        match self.response.get("Message") {
            Some(Value::String(msg)) => msg.contains("HRESULT"),
            Some(_) => false,
            None => self.status == 400,
        }
    }

    fn response_message(&self) -> Option<&str> {
        self.response.get("Message").and_then(Value::as_str)
    }
}

/// Result alias for DuploCloud API calls
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_not_found_gets_hint() {
        let err = ClientError::from_response(
            "https://duplo.test/subscriptions/t1/GetTenantSecret",
            "/subscriptions/t1/GetTenantSecret",
            404,
            Some("text/plain"),
            Some("not found"),
        );
        assert!(err.is_not_found());
        assert!(err.possible_missing_api());
        assert_eq!(
            err.message(),
            "url: https://duplo.test/subscriptions/t1/GetTenantSecret, status: 404, message: not found. Please verify object exists in duplocloud."
        );
        assert_eq!(err.response()["Message"], Value::String(err.message().into()));
    }

    #[test]
    fn test_v3_not_found_has_no_hint() {
        let err = ClientError::from_response(
            "https://duplo.test/v3/subscriptions/t1/aws/sqs/q",
            "/v3/subscriptions/t1/aws/sqs/q",
            404,
            None,
            Some("gone"),
        );
        assert!(err.message().ends_with("message: gone"));
    }

    #[test]
    fn test_json_body_is_decoded() {
        let err = ClientError::from_response(
            "https://duplo.test/v3/x",
            "/v3/x",
            400,
            Some("application/json; charset=utf-8"),
            Some(r#"{"Message":"Rate exceeded"}"#),
        );
        assert!(err.is_rate_exceeded());
        assert!(!err.is_400_or_timeout());
    }

    #[test]
    fn test_400_or_timeout_detection() {
        let hresult = ClientError::from_response(
            "u",
            "/v3/x",
            500,
            Some("application/json"),
            Some(r#"{"Message":"Exception from HRESULT: 0x800"}"#),
        );
        assert!(hresult.is_400_or_timeout());

        let mut bare = ClientError::with_status("bad", 400, "u");
        bare.response.clear();
        assert!(bare.is_400_or_timeout());

        assert!(!ClientError::new("plain").is_400_or_timeout());
    }

    #[test]
    fn test_new_error_has_no_status() {
        let err = ClientError::new("boom");
        assert_eq!(err.status(), -1);
        assert_eq!(err.url(), "");
        assert!(!err.possible_missing_api());
        assert_eq!(err.to_string(), "boom");
    }
}
