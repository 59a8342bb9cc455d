//! Expired key sweep
//!
//! Lookups already treat expired schema and row keys as absent. The sweep
//! reclaims the memory of cached result sets nobody asks for again, since a
//! query that is never repeated would otherwise keep its keys forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::kv::KvStore;

/// Removes every expired key once. Returns the number removed.
pub async fn sweep_expired(kv: &RwLock<KvStore>) -> usize {
    let mut kv = kv.write().await;
    let removed = kv.cleanup_expired();
    if removed > 0 {
        info!(removed, remaining = kv.len(), "expired cache keys swept");
    } else {
        debug!(remaining = kv.len(), "no expired cache keys");
    }
    removed
}

/// Spawns a task sweeping expired keys every `interval_secs` seconds
/// (at least one).
///
/// The returned handle is aborted on shutdown. Sweeps that fall behind are
/// delayed rather than run back to back, so a slow sweep never holds the
/// store's write lock twice in a row.
pub fn spawn_cleanup_task(kv: Arc<RwLock<KvStore>>, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "expired key sweep started");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep_expired(&kv).await;
        }
    })
}
