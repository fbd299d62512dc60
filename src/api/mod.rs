//! API Module
//!
//! HTTP handlers and routing for the gateway.
//!
//! # Endpoints
//! - `ANY /proxy/*path` - Forward a request to the backend
//! - `GET /stats` - Scheduler and cache statistics
//! - `GET /cache/keys` - List live cache keys
//! - `DELETE /cache` - Clear the cache
//! - `POST /cache/invalidate` - Invalidate by key, prefix or pattern
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
