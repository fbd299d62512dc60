//! Cache Sweep Task
//!
//! Background task that periodically drains the cache's expiry index.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a task that purges expired entries every `interval`.
///
/// The task only holds a weak reference and stops on its own once the
/// cache has been dropped. Abort the returned handle to stop it earlier.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task(&scheduler.cache(), Duration::from_secs(1));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task<V>(cache: &SharedCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let cache = Arc::downgrade(cache);

    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(strong) = cache.upgrade() else {
                debug!("Cache dropped, stopping sweep task");
                break;
            };

            let due = strong
                .read()
                .await
                .next_expiry()
                .is_some_and(|at| at <= tokio::time::Instant::now());
            if !due {
                debug!("Cache sweep: nothing due");
                continue;
            }

            let removed = strong.write().await.purge_expired();
            drop(strong);

            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}
