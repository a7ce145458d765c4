use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::models::SensorReading;

#[derive(Default)]
struct Inner {
    readings: HashMap<String, SensorReading>,
    /// Server-side receipt time, independent of the device clock.
    last_seen: HashMap<String, DateTime<Utc>>,
}

/// In-memory store of the most recent `SensorReading` per device, plus when
/// each device was last heard from.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other.
#[derive(Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<Inner>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reading` unless the cache already holds a newer one for the
    /// same device. Late, out-of-order readings never replace fresher data,
    /// but still count as the device being seen at `received_at`.
    pub async fn update(&self, reading: SensorReading, received_at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        let seen = inner.last_seen.entry(reading.device_id.clone()).or_insert(received_at);
        *seen = (*seen).max(received_at);

        match inner.readings.get(&reading.device_id) {
            Some(current) if current.time > reading.time => {}
            _ => {
                inner.readings.insert(reading.device_id.clone(), reading);
            }
        }
    }

    /// Snapshot of the latest reading of every device, ordered by device id.
    pub async fn all(&self) -> Vec<SensorReading> {
        let mut out: Vec<_> = self.inner.read().await.readings.values().cloned().collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }

    /// Latest reading for a specific device, if present.
    pub async fn get(&self, device_id: &str) -> Option<SensorReading> {
        self.inner.read().await.readings.get(device_id).cloned()
    }

    /// Receipt time of the last reading per device, ordered by device id.
    pub async fn last_seen(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .inner
            .read()
            .await
            .last_seen
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn make_reading(device_id: &str, gas: f64, age_secs: i64) -> SensorReading {
        SensorReading {
            device_id: device_id.to_owned(),
            gas: Some(gas),
            temp: None,
            humidity: None,
            flame: Some(1),
            time: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn empty_cache_returns_nothing() {
        let cache = ReadingCache::new();
        assert!(cache.all().await.is_empty());
        assert!(cache.get("dev1").await.is_none());
    }

    #[tokio::test]
    async fn update_overwrites_previous_reading() {
        let cache = ReadingCache::new();
        cache.update(make_reading("dev1", 100.0, 10), Utc::now()).await;
        cache.update(make_reading("dev1", 250.0, 0), Utc::now()).await;

        assert_eq!(cache.get("dev1").await.unwrap().gas, Some(250.0));
        assert_eq!(cache.all().await.len(), 1);
    }

    #[tokio::test]
    async fn older_reading_does_not_replace_newer() {
        let cache = ReadingCache::new();
        cache.update(make_reading("dev1", 250.0, 0), Utc::now()).await;
        cache.update(make_reading("dev1", 100.0, 30), Utc::now()).await;

        assert_eq!(cache.get("dev1").await.unwrap().gas, Some(250.0));
    }

    #[tokio::test]
    async fn different_devices_are_separate_entries() {
        let cache = ReadingCache::new();
        cache.update(make_reading("dev2", 300.0, 0), Utc::now()).await;
        cache.update(make_reading("dev1", 200.0, 0), Utc::now()).await;

        let all = cache.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].device_id, "dev1");
        assert_eq!(all[1].device_id, "dev2");
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let cache = ReadingCache::new();
        let clone = cache.clone();

        cache.update(make_reading("dev1", 42.0, 0), Utc::now()).await;

        assert_eq!(clone.get("dev1").await.unwrap().gas, Some(42.0));
    }

    #[tokio::test]
    async fn last_seen_tracks_receipt_not_capture_time() {
        let cache = ReadingCache::new();
        let received = Utc::now();
        let mut future = make_reading("dev1", 10.0, 0);
        future.time = received + Duration::hours(1);

        cache.update(future, received).await;
        cache.update(make_reading("dev1", 20.0, 30), received + Duration::seconds(5)).await;

        assert_eq!(
            cache.last_seen().await,
            vec![("dev1".to_owned(), received + Duration::seconds(5))]
        );
        // The out-of-order reading still did not replace the newer one.
        assert_eq!(cache.get("dev1").await.unwrap().gas, Some(10.0));
    }

    #[tokio::test]
    async fn last_seen_never_moves_backwards() {
        let cache = ReadingCache::new();
        let t0 = Utc::now();
        cache.update(make_reading("dev1", 1.0, 0), t0).await;
        cache.update(make_reading("dev1", 2.0, 0), t0 - Duration::seconds(10)).await;

        assert_eq!(cache.last_seen().await[0].1, t0);
    }
}
