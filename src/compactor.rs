use std::time::Duration;

use tracing::{debug, error};

use crate::observability;
use crate::repository::StoreResult;
use crate::store::Store;

/// Compact the store's WAL if at least `threshold` appends landed since the
/// last compaction. Returns whether it ran.
pub async fn compact_if_due(store: &Store, threshold: u64) -> StoreResult<bool> {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold.max(1) {
        return Ok(false);
    }
    debug!("compacting WAL after {appends} appends");
    store.compact_wal().await?;
    metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
    Ok(true)
}

/// Background task polling the append counter every `every`.
pub async fn run_compactor(store: Store, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            error!("WAL compaction failed: {e}");
        }
    }
}
