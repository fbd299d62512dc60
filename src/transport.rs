//! Transport Module
//!
//! The single network call the scheduler orchestrates, behind a trait so the
//! client can be driven by a real HTTP backend or a test double.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{RequestError, Result};
use crate::scheduler::Method;

// == Request / Response ==
/// One call to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path and query relative to the backend base URL, e.g. `/users?page=2`
    pub target: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Target without its query string.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }
}

/// A successful backend answer. Shared by every caller of a deduplicated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }
}

// == Transport Trait ==
/// Performs exactly one network call per `send`.
///
/// Non-success statuses are returned as `RequestError::Status` so the
/// classifier and retry executor can act on them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

// == HTTP Transport ==
/// `reqwest`-backed transport rooted at a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, target: &str) -> String {
        if target.starts_with('/') {
            format!("{}{}", self.base_url, target)
        } else {
            format!("{}/{}", self.base_url, target)
        }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Connection failures and timeouts may succeed on a later attempt.
fn transport_error(err: reqwest::Error) -> RequestError {
    let retryable = err.is_connect() || err.is_timeout();
    RequestError::transport(err.to_string(), retryable)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.target);
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(reqwest_method(request.method), url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            };
            return Err(RequestError::status(status.as_u16(), message));
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_strips_query() {
        assert_eq!(ApiRequest::get("/users?page=2").path(), "/users");
        assert_eq!(ApiRequest::get("/users/7").path(), "/users/7");
    }

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::new(Method::Post, "/orders")
            .with_body(serde_json::json!({"sku": "a1"}))
            .with_header("x-trace", "abc");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.headers, vec![("x-trace".to_string(), "abc".to_string())]);
        assert!(req.body.is_some());
    }

    #[test]
    fn test_url_joining() {
        let transport = HttpTransport::new("http://backend:8080/").unwrap();
        assert_eq!(transport.url("/users"), "http://backend:8080/users");
        assert_eq!(transport.url("users"), "http://backend:8080/users");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_retryable_transport_error() {
        // Port 9 on localhost is the discard service; nothing listens in test environments.
        let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();

        let err = transport.send(ApiRequest::get("/ping")).await.unwrap_err();

        assert!(matches!(err, RequestError::Transport { retryable: true, .. }));
    }
}
