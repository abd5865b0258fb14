//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::TableStore;
use crate::proxy::CachedTableStore;

/// Spawns a background task that periodically sweeps expired entries out of
/// every store of the proxy.
///
/// Returns the task's JoinHandle so it can be aborted during graceful
/// shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CachedTableStore::new(MemoryTableStore::new(), ProxySettings::default()));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<S>(
    cache: Arc<CachedTableStore<S>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()>
where
    S: TableStore + 'static,
{
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
