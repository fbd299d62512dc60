//! API Client Module
//!
//! Routes backend calls through the scheduler: reads are cached and
//! deduplicated by key, mutations always execute and then invalidate the
//! cached reads of the resource they touched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::Regex;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::KeyPattern;
use crate::error::Result;
use crate::scheduler::{Method, Scheduler, SubmitOptions};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Builds the scheduler key `METHOD:target[:cache_key]`.
pub fn request_key(method: Method, target: &str, cache_key: Option<&str>) -> String {
    match cache_key {
        Some(extra) => format!("{}:{}:{}", method, target, extra),
        None => format!("{}:{}", method, target),
    }
}

/// Pattern selecting every cached read of `path` and its sub-resources.
fn read_keys_under(path: &str) -> Option<KeyPattern> {
    let path = regex::escape(path.trim_end_matches('/'));
    Regex::new(&format!(r"^(GET|HEAD):{}([/?:].*)?$", path))
        .ok()
        .map(KeyPattern::Regex)
}

/// Completed mutations kept for checking reads that overlapped them.
const MUTATION_LOG_LEN: usize = 64;

// == Mutation Log ==
/// Recently completed mutations, numbered in completion order.
#[derive(Debug, Default)]
struct MutationLog {
    completed: u64,
    recent: VecDeque<(u64, KeyPattern)>,
}

impl MutationLog {
    fn record(&mut self, reads: KeyPattern) {
        self.completed += 1;
        self.recent.push_back((self.completed, reads));
        if self.recent.len() > MUTATION_LOG_LEN {
            self.recent.pop_front();
        }
    }

    /// Whether a mutation completed after `seen` touched `key`.
    ///
    /// Mutations already dropped from the log are assumed to have.
    fn touched_since(&self, seen: u64, key: &str) -> bool {
        if self.completed == seen {
            return false;
        }
        match self.recent.front() {
            Some(&(oldest, _)) if oldest <= seen + 1 => self
                .recent
                .iter()
                .any(|(seq, reads)| *seq > seen && reads.matches(key)),
            _ => true,
        }
    }
}

// == API Client ==
#[derive(Clone)]
pub struct ApiClient {
    scheduler: Scheduler<ApiResponse>,
    transport: Arc<dyn Transport>,
    mutation_seq: Arc<AtomicU64>,
    mutations: Arc<Mutex<MutationLog>>,
}

impl ApiClient {
    pub fn new(scheduler: Scheduler<ApiResponse>, transport: Arc<dyn Transport>) -> Self {
        Self {
            scheduler,
            transport,
            mutation_seq: Arc::new(AtomicU64::new(0)),
            mutations: Arc::new(Mutex::new(MutationLog::default())),
        }
    }

    pub fn scheduler(&self) -> &Scheduler<ApiResponse> {
        &self.scheduler
    }

    pub async fn get(&self, target: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::get(target), SubmitOptions::default())
            .await
    }

    pub async fn post(&self, target: &str, body: serde_json::Value) -> Result<ApiResponse> {
        let request = ApiRequest::new(Method::Post, target).with_body(body);
        self.request(request, SubmitOptions::default()).await
    }

    pub async fn put(&self, target: &str, body: serde_json::Value) -> Result<ApiResponse> {
        let request = ApiRequest::new(Method::Put, target).with_body(body);
        self.request(request, SubmitOptions::default()).await
    }

    pub async fn delete(&self, target: &str) -> Result<ApiResponse> {
        let request = ApiRequest::new(Method::Delete, target);
        self.request(request, SubmitOptions::default()).await
    }

    pub async fn request(&self, request: ApiRequest, options: SubmitOptions) -> Result<ApiResponse> {
        self.request_keyed(request, None, options).await
    }

    /// Sends `request` through the scheduler.
    ///
    /// `cache_key` distinguishes reads of the same target whose responses
    /// differ, e.g. per-user variants. `options.method` is taken from the
    /// request.
    ///
    /// A read that was already running when a mutation of the same path
    /// completed has its cached result dropped once it settles.
    pub async fn request_keyed(
        &self,
        request: ApiRequest,
        cache_key: Option<&str>,
        options: SubmitOptions,
    ) -> Result<ApiResponse> {
        let method = request.method;
        let mut key = request_key(method, &request.target, cache_key);
        if !method.is_cacheable() {
            let seq = self.mutation_seq.fetch_add(1, Ordering::Relaxed);
            key = format!("{}#{}", key, seq);
        }
        let path = request.path().to_string();
        let seen = self.mutations.lock().await.completed;

        let transport = Arc::clone(&self.transport);
        let operation = move || {
            let transport = Arc::clone(&transport);
            let request = request.clone();
            async move { transport.send(request).await }
        };

        let response = self
            .scheduler
            .submit(key.clone(), operation, options.method(method))
            .await?;

        if !method.is_cacheable() {
            if let Some(pattern) = read_keys_under(&path) {
                self.mutations.lock().await.record(pattern.clone());
                let removed = self.scheduler.invalidate(pattern).await;
                debug!(method = %method, path = %path, removed, "Invalidated reads after mutation");
            }
        } else if self.mutations.lock().await.touched_since(seen, &key) {
            let removed = self.scheduler.invalidate(key.as_str()).await;
            debug!(key = %key, removed, "Dropped read that overlapped a mutation");
        }

        Ok(response)
    }
}
