//! Transport abstraction
//!
//! The reconciler never talks HTTP directly. Providers hand it a
//! [`Transport`] that turns an [`ApiRequest`] into an [`ApiResponse`],
//! which keeps the core testable against in-memory fakes.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API request, relative to the provider's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub timeout: Duration,
    pub payload: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            path: path.into(),
            timeout,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Response from the provider
///
/// `body` is the decoded JSON body (`null` when empty). For error statuses
/// transports put the provider's error message here as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Human-readable message for error reporting
    pub fn message(&self) -> String {
        match &self.body {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.body.to_string()),
            other => other.to_string(),
        }
    }
}

/// Failure below HTTP: connection refused, DNS, per-request timeout, ...
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Sends requests to a provider API
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;

    #[test]
    fn test_response_message() {
        assert_eq!(
            ApiResponse::new(400, json!("bad hostname")).message(),
            "bad hostname"
        );
        assert_eq!(
            ApiResponse::new(400, json!({"code": 400, "message": "nope"})).message(),
            "nope"
        );
        assert_eq!(ApiResponse::new(500, Value::Null).message(), "");
    }

    #[test]
    fn test_scripted_transport_repeats_last_response() {
        let transport = ScriptedTransport::new(vec![(200, json!({"id": 1})), (404, json!("gone"))]);
        let request = ApiRequest::new(Method::Get, "widgets/1", Duration::from_secs(1));

        let statuses: Vec<u16> = (0..3)
            .map(|_| tokio_test::block_on(transport.send(&request)).unwrap().status)
            .collect();
        assert_eq!(statuses, vec![200, 404, 404]);
    }

    #[test]
    fn test_method_is_mutating() {
        assert!(!Method::Get.is_mutating());
        assert!(Method::Post.is_mutating());
        assert!(Method::Delete.is_mutating());
        assert_eq!(Method::Put.to_string(), "PUT");
    }
}
