//! Storage seams between the services and their backing stores.
//!
//! `PgStore` implements all of these against Postgres. Tests swap in an
//! in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Alert, AlertRecord, DeviceThresholdConfig, SensorReading};

/// Point lookup of the active threshold configuration for a device.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, device_id: &str) -> anyhow::Result<Option<DeviceThresholdConfig>>;

    /// Insert or replace the configuration for `config.device_id`.
    async fn upsert_config(&self, config: &DeviceThresholdConfig) -> anyhow::Result<()>;
}

/// Durable destination for emitted alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn insert(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Read/acknowledge/delete access to stored alerts for the HTTP layer.
#[async_trait]
pub trait AlertRepository: AlertSink {
    /// Newest first, optionally restricted to one device.
    async fn list(&self, device_id: Option<&str>, limit: i64) -> anyhow::Result<Vec<AlertRecord>>;

    /// Returns the updated record, or `None` if no alert has this id.
    async fn acknowledge(
        &self,
        id: Uuid,
        acknowledged_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<AlertRecord>>;

    /// Acknowledge every unacknowledged alert; returns how many changed.
    async fn acknowledge_all(
        &self,
        acknowledged_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    /// Returns `false` if no alert has this id.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

/// Best-effort lookup of the address that should receive a device's alerts.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn resolve_email(&self, device_id: &str) -> anyhow::Result<Option<String>>;
}

/// Persistence of raw readings and device liveness.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert_reading(&self, reading: &SensorReading) -> anyhow::Result<()>;

    /// Mark the device online and move its `last_seen` forward.
    async fn touch_device(&self, device_id: &str, seen_at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Mark every online device not seen since `cutoff` as offline.
    /// Returns how many devices changed.
    async fn mark_stale_offline(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;
}
