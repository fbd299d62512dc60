//! API Routes
//!
//! Configures the Axum router with the proxy and cache-control endpoints.

use axum::{
    routing::{any, delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invalidate_handler, keys_handler, proxy_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `ANY /proxy/*path` - Forward to the backend through the scheduler
/// - `GET /stats` - Scheduler and cache counters
/// - `GET /cache/keys` - Live cache keys
/// - `DELETE /cache` - Clear the cache
/// - `POST /cache/invalidate` - Remove entries by key, prefix or pattern
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/proxy/*path", any(proxy_handler))
        .route("/stats", get(stats_handler))
        .route("/cache/keys", get(keys_handler))
        .route("/cache", delete(clear_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::config::SchedulerConfig;
    use crate::scheduler::Scheduler;
    use crate::transport::{ApiRequest, ApiResponse, Transport};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct OkTransport;

    #[async_trait]
    impl Transport for OkTransport {
        async fn send(&self, _request: ApiRequest) -> crate::error::Result<ApiResponse> {
            Ok(ApiResponse::new(200, "ok"))
        }
    }

    fn create_test_app() -> Router {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        let state = AppState::new(ApiClient::new(scheduler, Arc::new(OkTransport)));
        create_router(state)
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        create_test_app()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(status_of("GET", "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cache_endpoints() {
        assert_eq!(status_of("GET", "/cache/keys").await, StatusCode::OK);
        assert_eq!(status_of("DELETE", "/cache").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_accepts_any_supported_method() {
        for method in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            assert_eq!(status_of(method, "/proxy/items/1").await, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        assert_eq!(status_of("GET", "/nowhere").await, StatusCode::NOT_FOUND);
    }
}
