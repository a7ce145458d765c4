use std::{
    collections::HashMap,
    sync::{Arc, Mutex as SyncMutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slot = Arc<Mutex<Option<DateTime<Utc>>>>;

/// Last emission time per device, owned by one monitor instance.
///
/// Each device gets its own slot behind an async mutex. Holding a
/// [`DeviceCooldown`] guard serialises evaluations for that device while
/// other devices proceed in parallel. Nothing is persisted: a new instance
/// starts with every device eligible to alert.
///
/// Only devices that have emitted keep a slot; a slot that never recorded an
/// emission is dropped once its last holder releases it.
#[derive(Clone, Default)]
pub struct CooldownState {
    slots: Arc<SyncMutex<HashMap<String, Slot>>>,
}

impl CooldownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `device_id`'s cooldown slot.
    pub async fn lock(&self, device_id: &str) -> DeviceCooldown {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device_id.to_owned())
            .or_default()
            .clone();
        DeviceCooldown {
            guard: Some(slot.lock_owned().await),
            device_id: device_id.to_owned(),
            state: self.clone(),
        }
    }

    /// Last emission time for `device_id`, if any.
    pub async fn last_emitted(&self, device_id: &str) -> Option<DateTime<Utc>> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()?;
        let last = *slot.lock().await;
        last
    }

    /// Number of devices currently holding a slot.
    pub fn tracked_devices(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, device_id: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.get(device_id) else {
            return;
        };
        // Nobody else holds or waits on the slot, and it never emitted.
        let unused = Arc::strong_count(slot) == 1
            && slot.try_lock().map(|last| last.is_none()).unwrap_or(false);
        if unused {
            slots.remove(device_id);
        }
    }
}

/// Exclusive handle on one device's cooldown slot.
pub struct DeviceCooldown {
    guard: Option<OwnedMutexGuard<Option<DateTime<Utc>>>>,
    device_id: String,
    state: CooldownState,
}

impl DeviceCooldown {
    fn last(&self) -> Option<DateTime<Utc>> {
        self.guard.as_deref().copied().flatten()
    }

    /// Milliseconds still to wait at `now`, or `None` when an alert may go out.
    pub fn remaining_ms(&self, now: DateTime<Utc>, cooldown_ms: i64) -> Option<i64> {
        let last = self.last()?;
        let elapsed = (now - last).num_milliseconds();
        (elapsed < cooldown_ms).then(|| cooldown_ms - elapsed)
    }

    /// Record a successful emission.
    pub fn mark_emitted(&mut self, at: DateTime<Utc>) {
        if let Some(guard) = self.guard.as_mut() {
            **guard = Some(at);
        }
    }
}

impl Drop for DeviceCooldown {
    fn drop(&mut self) {
        let emitted = self.last().is_some();
        drop(self.guard.take());
        if !emitted {
            self.state.release(&self.device_id);
        }
    }
}
