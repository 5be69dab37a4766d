//! Periodic purge of expired keys from the in-process store.
//!
//! The in-memory backend evicts lazily on access; keys nobody reads again
//! (old cache entries, idle rate counters) are dropped here.

use std::sync::Arc;
use std::time::Duration;

use genhub_pipeline::Store;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Run the purge loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn Store>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Store janitor started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Store janitor stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(0) => tracing::debug!("Store janitor: nothing expired"),
                    Ok(purged) => tracing::info!(purged, "Store janitor: purged expired keys"),
                    Err(e) => tracing::error!(error = %e, "Store janitor: purge failed"),
                }
            }
        }
    }
}
