//! Cherry Servers REST transport
//!
//! Direct API implementation over `reqwest` with Bearer token
//! authentication. Every request carries its own timeout.

use crate::config::ClientConfig;
use crate::error::Result;
use async_trait::async_trait;
use cherryflow_cloud::{
    ApiRequest, ApiResponse, AuthStatus, CloudError, Method, Transport, TransportError,
};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

const AUTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Truncate a response body for log output
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Decode a response body
///
/// Empty bodies become `null`. Error statuses are reduced to the API's
/// `message` field, or the raw text when the body is not JSON.
fn decode_body(status: u16, text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }

    let parsed = serde_json::from_str::<Value>(text);
    if status < 400 {
        return parsed.unwrap_or_else(|_| Value::String(text.to_string()));
    }

    let message = parsed
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string());
    Value::String(message)
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// HTTP transport for the Cherry Servers API
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Ask the API who the token belongs to
///
/// Anything but 200 is an [`CloudError::AuthenticationFailed`].
pub async fn check_auth(transport: &dyn Transport) -> cherryflow_cloud::Result<AuthStatus> {
    let request = ApiRequest::new(Method::Get, "user", AUTH_CHECK_TIMEOUT);
    let response = transport
        .send(&request)
        .await
        .map_err(|e| CloudError::AuthenticationFailed(e.to_string()))?;

    if response.status != 200 {
        return Err(CloudError::AuthenticationFailed(format!(
            "status {}: {}",
            response.status,
            response.message()
        )));
    }

    let account = response
        .body
        .get("email")
        .or_else(|| response.body.get("full_name"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    Ok(AuthStatus::ok(account))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(to_reqwest(request.method), &url)
            .bearer_auth(&self.auth_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(request.timeout);
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(format!("failed to send request: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("failed to read response body: {e}")))?;

        if status >= 400 {
            tracing::debug!(
                "{} {} -> {}: {}",
                request.method,
                request.path,
                status,
                sanitize_for_log(&text)
            );
        }

        Ok(ApiResponse::new(status, decode_body(status, &text)))
    }
}
