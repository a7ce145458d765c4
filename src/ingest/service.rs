use std::sync::Arc;

use anyhow::{ensure, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    db::models::SensorReading,
    monitor::{Evaluation, ThresholdMonitor},
    ports::ReadingStore,
    reading_cache::ReadingCache,
};

/// Entry point for readings arriving from devices.
pub struct IngestService {
    store: Arc<dyn ReadingStore>,
    cache: ReadingCache,
    monitor: Arc<ThresholdMonitor>,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        cache: ReadingCache,
        monitor: Arc<ThresholdMonitor>,
    ) -> Self {
        Self { store, cache, monitor }
    }

    /// Persists `reading`, records the device as seen, refreshes the cache
    /// and runs it through the threshold monitor.
    ///
    /// A failed persist aborts before evaluation. A failed liveness update
    /// is only logged.
    pub async fn ingest(&self, reading: SensorReading) -> Result<Evaluation> {
        ensure!(!reading.device_id.trim().is_empty(), "device_id must not be empty");
        info!(
            device_id = %reading.device_id,
            gas = ?reading.gas,
            temp = ?reading.temp,
            humidity = ?reading.humidity,
            flame = ?reading.flame,
            "Sensor reading received"
        );

        self.store.insert_reading(&reading).await?;

        // Liveness follows the server clock; device clocks may drift.
        let received_at = Utc::now();
        if let Err(e) = self.store.touch_device(&reading.device_id, received_at).await {
            warn!(device_id = %reading.device_id, error = %e, "Failed to update device last_seen");
        }

        self.cache.update(reading.clone(), received_at).await;

        Ok(self.monitor.evaluate(&reading).await)
    }
}
