//! Scheduler Module
//!
//! Deduplicating, concurrency-bounded execution of keyed requests.
//!
//! # Flow
//! 1. A live cache entry for the key answers the request immediately.
//! 2. A request whose key is already in flight attaches to that execution.
//! 3. Otherwise the request is queued FIFO and admitted while fewer than
//!    `concurrency_limit` executions are running.
//! 4. When an execution settles its slot and in-flight entry are released,
//!    its result is cached (if eligible) and handed to every attached caller,
//!    and the next queued request is admitted.
//!
//! Cache lookup, dedup, enqueue, and settlement all happen under one lock,
//! always taken before the cache lock.

mod options;
mod queue;
mod stats;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, KeyPattern, ResponseCache, SharedCache};
use crate::config::SchedulerConfig;
use crate::error::{ConfigError, RequestError, Result};
use crate::retry::{run_with_retry, RetryContext};

pub use options::{Method, SubmitOptions};
pub use queue::OverflowPolicy;
pub use stats::SchedulerStats;

use queue::{AdmissionQueue, Enqueued, QueuedRequest};

type Waiter<V> = oneshot::Sender<Result<V>>;

// == Scheduler ==
/// Handle to a scheduler instance. Clones share the same state.
pub struct Scheduler<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for Scheduler<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<V> {
    config: SchedulerConfig,
    cache: SharedCache<V>,
    state: Mutex<State<V>>,
}

struct State<V> {
    /// Callers attached to each key, in attach order
    in_flight: HashMap<String, Vec<Waiter<V>>>,
    queue: AdmissionQueue<V>,
    executing: usize,
    stats: SchedulerStats,
}

impl<V> Scheduler<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an isolated scheduler with its own cache.
    pub fn new(config: SchedulerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Scheduler created: concurrency_limit={}, default_ttl={:?}, default_max_retries={}",
            config.concurrency_limit, config.default_ttl, config.default_max_retries
        );

        let state = State {
            in_flight: HashMap::new(),
            queue: AdmissionQueue::new(config.max_queue_depth, config.overflow_policy),
            executing: 0,
            stats: SchedulerStats::default(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                cache: Arc::new(RwLock::new(ResponseCache::new())),
                state: Mutex::new(state),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Shared cache handle, e.g. for `spawn_sweep_task`.
    pub fn cache(&self) -> SharedCache<V> {
        Arc::clone(&self.inner.cache)
    }

    // == Submit ==
    /// Runs `operation` under `key`, or joins/reuses an existing result.
    ///
    /// The operation is invoked at most once per in-flight key; every caller
    /// attached to that key receives the same success or failure. A
    /// cancellation token or deadline in `options` belongs to the execution
    /// it starts, so it also ends the wait of callers that joined it.
    pub async fn submit<F, Fut>(
        &self,
        key: impl Into<String>,
        operation: F,
        options: SubmitOptions,
    ) -> Result<V>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let key = key.into();
        let ttl = self.effective_ttl(&options);
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.inner.state.lock().await;
            state.stats.submitted += 1;

            if ttl.is_some() {
                if let Some(value) = self.inner.cache.write().await.get(&key) {
                    state.stats.cache_hits += 1;
                    debug!(key = %key, "Served from cache");
                    return Ok(value);
                }
            }

            if let Some(waiters) = state.in_flight.get_mut(&key) {
                waiters.push(tx);
                let attached = waiters.len();
                state.stats.deduplicated += 1;
                debug!(key = %key, attached, "Joined in-flight request");
            } else {
                let request = self.prepare(key.clone(), ttl, operation, &options);
                match state.queue.push(request) {
                    Enqueued::Accepted => {
                        state.in_flight.insert(key, vec![tx]);
                    }
                    Enqueued::Rejected(_) => {
                        state.stats.rejected += 1;
                        let capacity = state.queue.capacity();
                        warn!(key = %key, capacity, "Queue full, rejecting request");
                        return Err(RequestError::QueueFull { capacity });
                    }
                    Enqueued::Displaced(oldest) => {
                        state.stats.rejected += 1;
                        let capacity = state.queue.capacity();
                        warn!(key = %oldest.key, capacity, "Queue full, dropping oldest request");
                        let waiters = state.in_flight.remove(&oldest.key).unwrap_or_default();
                        for waiter in waiters {
                            let _ = waiter.send(Err(RequestError::QueueFull { capacity }));
                        }
                        state.in_flight.insert(key, vec![tx]);
                    }
                }
                self.inner.admit(&mut state);
            }
        }

        rx.await.unwrap_or_else(|_| {
            Err(RequestError::Abandoned(
                "executor dropped before settling".to_string(),
            ))
        })
    }

    // == Cache Controls ==
    /// Removes the cached entries selected by `pattern`. Returns the count.
    pub async fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        let pattern = pattern.into();
        let removed = self.inner.cache.write().await.delete_matching(&pattern);
        debug!(?pattern, removed, "Invalidated cache entries");
        removed
    }

    /// Empties the cache. Returns the number of entries removed.
    pub async fn clear(&self) -> usize {
        let removed = self.inner.cache.write().await.clear();
        info!("Cache cleared: {} entries removed", removed);
        removed
    }

    pub async fn cache_keys(&self) -> Vec<String> {
        self.inner.cache.read().await.keys()
    }

    pub async fn cache_len(&self) -> usize {
        self.inner.cache.read().await.len()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.read().await.stats()
    }

    pub async fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock().await;
        SchedulerStats {
            executing: state.executing,
            queued: state.queue.len(),
            in_flight: state.in_flight.len(),
            ..state.stats.clone()
        }
    }

    /// TTL this request is cached with, if any.
    fn effective_ttl(&self, options: &SubmitOptions) -> Option<Duration> {
        if !options.method.is_cacheable() {
            return None;
        }
        options
            .ttl
            .or(self.inner.config.default_ttl)
            .filter(|ttl| !ttl.is_zero())
    }

    /// Wraps `operation` in the retry executor. Nothing runs until admission.
    fn prepare<F, Fut>(
        &self,
        key: String,
        ttl: Option<Duration>,
        operation: F,
        options: &SubmitOptions,
    ) -> QueuedRequest<V>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let config = &self.inner.config;
        let policy = config.retry_policy(options.max_retries);

        let mut ctx = RetryContext::new();
        if let Some(token) = &options.cancel {
            ctx = ctx.with_cancel(token.clone());
        }
        if let Some(deadline) = options.deadline.or(config.default_deadline) {
            ctx = ctx.with_deadline(deadline);
        }

        QueuedRequest {
            key,
            ttl,
            job: async move { run_with_retry(operation, &policy, &ctx).await }.boxed(),
        }
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts queued requests while execution slots are free.
    fn admit(self: &Arc<Self>, state: &mut State<V>) {
        while state.executing < self.config.concurrency_limit {
            let Some(request) = state.queue.pop() else {
                break;
            };
            state.executing += 1;
            state.stats.executions += 1;
            debug!(
                key = %request.key,
                executing = state.executing,
                queued = state.queue.len(),
                "Admitting request"
            );
            tokio::spawn(Arc::clone(self).execute(request));
        }
    }

    async fn execute(self: Arc<Self>, request: QueuedRequest<V>) {
        let QueuedRequest { key, ttl, job } = request;

        let result = AssertUnwindSafe(job)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(RequestError::Abandoned("operation panicked".to_string())));

        self.settle(key, ttl, result).await;
    }

    /// Caches, fans out, and releases the execution slot for `key`.
    ///
    /// The slot and in-flight entry are released before the cache write, and
    /// a panicking write only costs the cache entry.
    async fn settle(self: &Arc<Self>, key: String, ttl: Option<Duration>, result: Result<V>) {
        let mut state = self.state.lock().await;

        state.executing -= 1;
        let waiters = state.in_flight.remove(&key).unwrap_or_default();

        match (&result, ttl) {
            (Ok(value), Some(ttl)) => {
                state.stats.succeeded += 1;
                let mut cache = self.cache.write().await;
                let stored = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    cache.set(key.clone(), value.clone(), Some(ttl))
                }));
                if stored.is_err() {
                    warn!(key = %key, ?ttl, "Failed to cache result");
                }
            }
            (Ok(_), None) => state.stats.succeeded += 1,
            (Err(error), _) => {
                state.stats.failed += 1;
                warn!(key = %key, "Request failed: {}", error);
            }
        }

        debug!(key = %key, callers = waiters.len(), "Request settled");
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        self.admit(&mut state);
    }
}
