//! Request Orchestrator - client-side request scheduling core
//!
//! Deduplicates identical in-flight requests, bounds concurrency with FIFO
//! admission, caches successful reads with a TTL, and retries failures with
//! exponential backoff gated by an error classifier.

pub mod api;
pub mod cache;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod scheduler;
pub mod tasks;
pub mod transport;

pub use api::AppState;
pub use cache::KeyPattern;
pub use classify::{classify, Classification, ErrorKind};
pub use client::ApiClient;
pub use config::{Config, SchedulerConfig};
pub use error::{ConfigError, RequestError};
pub use retry::{RetryGate, RetryPolicy};
pub use scheduler::{Method, OverflowPolicy, Scheduler, SubmitOptions};
pub use tasks::spawn_sweep_task;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
