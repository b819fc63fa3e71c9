//! Periodic cleanup task (§4.8, §12 `CLEANUP_INTERVAL_SECS`): sweeps expired
//! rows out of the token store on a fixed cadence. Modeled as a detached
//! long-running task with no shared state beyond the `cleanup()` call,
//! matching how the teacher expresses its own background housekeeping.

use super::store::SharedTokenStore;
use std::time::Duration;
use tracing::{info, warn};

pub fn spawn(store: SharedTokenStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so cleanup runs on the
        // configured cadence rather than at startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.cleanup().await {
                Ok(removed) if removed > 0 => info!(removed, "swept expired oauth tokens"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "token store cleanup failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{MockTokenStore, TokenStore};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_tokens_on_tick() {
        let store: SharedTokenStore = Arc::new(MockTokenStore::new());
        store
            .save("stale", "client-a", Utc::now() - ChronoDuration::hours(1))
            .await
            .unwrap();

        let handle = spawn(store.clone(), Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(25)).await;
        tokio::task::yield_now().await;

        assert!(store.get("stale").await.unwrap().is_none());
        handle.abort();
    }
}
