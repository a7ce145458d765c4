use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time;
use tracing::{error, info};

use crate::ports::ReadingStore;

/// Marks devices offline once they stop reporting.
pub struct OfflineDetector {
    store: Arc<dyn ReadingStore>,
    interval: Duration,
    stale_after: chrono::Duration,
}

impl OfflineDetector {
    pub fn new(store: Arc<dyn ReadingStore>, interval_secs: u64, stale_after_secs: u64) -> Self {
        Self {
            store,
            // tokio tickers reject a zero period
            interval: Duration::from_secs(interval_secs.max(1)),
            stale_after: i64::try_from(stale_after_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Runs the detector loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    ///
    /// The first check happens one full interval after start, so a restart
    /// does not flip every device offline before it has had a chance to report.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            stale_after_secs = self.stale_after.num_seconds(),
            "Offline detector started"
        );
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Offline detector iteration failed");
            }
        }
    }

    async fn run_once(&self) -> anyhow::Result<u64> {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.stale_after) else {
            return Ok(0);
        };
        let changed = self.store.mark_stale_offline(cutoff).await?;
        if changed > 0 {
            info!(devices = changed, "Marked stale devices offline");
        }
        Ok(changed)
    }
}
