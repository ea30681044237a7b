use std::time::Duration;

use chrono::Utc;

use crate::services::status_store::StatusStore;

/// Periodically drops finished status records older than the retention
/// window. Only started when a TTL is configured.
pub struct CleanupService {
    store: StatusStore,
    ttl: Duration,
    interval: Duration,
}

impl CleanupService {
    pub fn new(store: StatusStore, ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
        }
    }

    pub async fn run_scheduler(self) {
        tracing::info!(ttl = ?self.ttl, interval = ?self.interval, "Status cleanup scheduler started");
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            self.sweep();
        }
    }

    pub fn sweep(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return 0;
        };
        let evicted = self.store.evict_terminal_before(Utc::now() - ttl);
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.store.len(), "Evicted finished status records");
        }
        evicted
    }
}
