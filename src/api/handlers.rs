//! API Handlers
//!
//! HTTP request handlers for the proxy and cache-control endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method as HttpMethod, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::client::ApiClient;
use crate::config::{Config, MAX_TTL};
use crate::error::{ConfigError, GatewayError};
use crate::models::{
    HealthResponse, InvalidateRequest, InvalidateResponse, KeysResponse, StatsResponse,
};
use crate::scheduler::{Method, Scheduler, SubmitOptions};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Selects a cache variant, forming the key `METHOD:target:<value>`.
pub const CACHE_KEY_HEADER: &str = "x-cache-key";

/// Per-request cache TTL in seconds; `0` disables caching.
pub const CACHE_TTL_HEADER: &str = "x-cache-ttl";

/// Headers forwarded to the backend unchanged.
const FORWARDED_HEADERS: [header::HeaderName; 2] = [header::AUTHORIZATION, header::ACCEPT];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: ApiClient,
}

impl AppState {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Builds the scheduler and an HTTP transport from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let scheduler = Scheduler::new(config.scheduler.clone())?;
        let transport = HttpTransport::new(config.upstream_url.clone()).map_err(|_| {
            ConfigError::Invalid {
                name: "UPSTREAM_URL",
                value: config.upstream_url.clone(),
            }
        })?;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        Ok(Self::new(ApiClient::new(scheduler, transport)))
    }
}

/// Handler for ANY /proxy/*path
///
/// Forwards the request to the backend through the scheduler. Reads are
/// cached and deduplicated; mutations invalidate cached reads of the path.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: HttpMethod,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let method: Method = method
        .as_str()
        .parse()
        .map_err(|_| GatewayError::UnsupportedMethod(method.to_string()))?;

    let mut target = format!("/{}", path.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(&query);
    }

    let mut request = ApiRequest::new(method, target);
    if !body.is_empty() {
        let json = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::InvalidRequest(format!("Body must be JSON: {}", e)))?;
        request = request.with_body(json);
    }
    for name in &FORWARDED_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            request = request.with_header(name.as_str(), value);
        }
    }

    let mut options = SubmitOptions::new();
    if let Some(ttl) = header_str(&headers, CACHE_TTL_HEADER) {
        let secs: u64 = ttl
            .parse()
            .ok()
            .filter(|&secs| secs <= MAX_TTL.as_secs())
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("Invalid {}: {}", CACHE_TTL_HEADER, ttl))
            })?;
        options = options.ttl(Duration::from_secs(secs));
    }
    let cache_key = header_str(&headers, CACHE_KEY_HEADER);

    let response = state
        .client
        .request_keyed(request, cache_key, options)
        .await?;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let content_type = response
        .content_type
        .unwrap_or_else(|| "text/plain; charset=utf-8".to_string());
    Ok((status, [(header::CONTENT_TYPE, content_type)], response.body).into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handler for GET /stats
///
/// Returns scheduler and cache counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let scheduler = state.client.scheduler();
    Json(StatsResponse::new(
        scheduler.stats().await,
        scheduler.cache_stats().await,
    ))
}

/// Handler for GET /cache/keys
pub async fn keys_handler(State(state): State<AppState>) -> Json<KeysResponse> {
    Json(KeysResponse::new(state.client.scheduler().cache_keys().await))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    Json(InvalidateResponse::new(state.client.scheduler().clear().await))
}

/// Handler for POST /cache/invalidate
///
/// Removes entries selected by exactly one of `key`, `prefix` or `pattern`.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, GatewayError> {
    let pattern = req.into_pattern().map_err(GatewayError::InvalidRequest)?;
    let removed = state.client.scheduler().invalidate(pattern).await;

    Ok(Json(InvalidateResponse::new(removed)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
