//! In-memory doubles for the storage ports, plus a hand-driven clock.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::models::{Alert, AlertRecord, DeviceThresholdConfig, SensorReading},
    monitor::Clock,
    ports::{AlertRepository, AlertSink, ConfigStore, ReadingStore, RecipientResolver},
};

#[derive(Default)]
pub struct MemoryStore {
    configs: RwLock<HashMap<String, DeviceThresholdConfig>>,
    alerts: RwLock<Vec<AlertRecord>>,
    readings: RwLock<Vec<SensorReading>>,
    /// device_id -> (online, last_seen)
    devices: RwLock<HashMap<String, (bool, DateTime<Utc>)>>,
    subscribers: RwLock<HashMap<String, String>>,
    insert_calls: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_config_lookups: AtomicBool,
    fail_recipient_lookups: AtomicBool,
    insert_delay: StdMutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_config(&self, config: DeviceThresholdConfig) {
        self.configs
            .write()
            .await
            .insert(config.device_id.clone(), config);
    }

    pub async fn put_subscriber(&self, device_id: &str, email: &str) {
        self.subscribers
            .write()
            .await
            .insert(device_id.to_owned(), email.to_owned());
    }

    pub async fn put_alert(&self, record: AlertRecord) {
        self.alerts.write().await.push(record);
    }

    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.clone()
    }

    pub async fn readings(&self) -> Vec<SensorReading> {
        self.readings.read().await.clone()
    }

    pub async fn device(&self, device_id: &str) -> Option<(bool, DateTime<Utc>)> {
        self.devices.read().await.get(device_id).copied()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_config_lookups(&self, fail: bool) {
        self.fail_config_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_recipient_lookups(&self, fail: bool) {
        self.fail_recipient_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_insert_delay(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(&self, device_id: &str) -> Result<Option<DeviceThresholdConfig>> {
        if self.fail_config_lookups.load(Ordering::SeqCst) {
            bail!("config store unavailable");
        }
        Ok(self.configs.read().await.get(device_id).cloned())
    }

    async fn upsert_config(&self, config: &DeviceThresholdConfig) -> Result<()> {
        self.put_config(config.clone()).await;
        Ok(())
    }
}

#[async_trait]
impl AlertSink for MemoryStore {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            bail!("alerts table rejected the write");
        }
        self.put_alert(AlertRecord::new(alert.clone())).await;
        Ok(())
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn list(&self, device_id: Option<&str>, limit: i64) -> Result<Vec<AlertRecord>> {
        let mut out: Vec<_> = self
            .alerts
            .read()
            .await
            .iter()
            .filter(|a| device_id.map_or(true, |id| a.device_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.time.cmp(&a.time));
        out.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(out)
    }

    async fn acknowledge(
        &self,
        id: Uuid,
        acknowledged_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>> {
        let mut alerts = self.alerts.write().await;
        Ok(alerts.iter_mut().find(|a| a.id == id).map(|a| {
            a.acknowledged = true;
            a.acknowledged_at = Some(at);
            a.acknowledged_by = acknowledged_by.map(str::to_owned);
            a.clone()
        }))
    }

    async fn acknowledge_all(&self, acknowledged_by: Option<&str>, at: DateTime<Utc>) -> Result<u64> {
        let mut changed = 0;
        for a in self.alerts.write().await.iter_mut().filter(|a| !a.acknowledged) {
            a.acknowledged = true;
            a.acknowledged_at = Some(at);
            a.acknowledged_by = acknowledged_by.map(str::to_owned);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        Ok(alerts.len() != before)
    }
}

#[async_trait]
impl RecipientResolver for MemoryStore {
    async fn resolve_email(&self, device_id: &str) -> Result<Option<String>> {
        if self.fail_recipient_lookups.load(Ordering::SeqCst) {
            bail!("subscriber lookup unavailable");
        }
        Ok(self.subscribers.read().await.get(device_id).cloned())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, reading: &SensorReading) -> Result<()> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn touch_device(&self, device_id: &str, seen_at: DateTime<Utc>) -> Result<()> {
        let mut devices = self.devices.write().await;
        let entry = devices.entry(device_id.to_owned()).or_insert((true, seen_at));
        entry.0 = true;
        entry.1 = entry.1.max(seen_at);
        Ok(())
    }

    async fn mark_stale_offline(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut changed = 0;
        for (online, last_seen) in self.devices.write().await.values_mut() {
            if *online && *last_seen < cutoff {
                *online = false;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: StdMutex::new(start) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
