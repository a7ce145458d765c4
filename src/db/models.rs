use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Mirrors the `alert_severity` Postgres enum.
///
/// Variants are declared in ascending order so `Ord` ranks `Critical` highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Sensor readings
// ---------------------------------------------------------------------------

/// One measurement snapshot from an ESP32 device.
///
/// Absent sensors are `None`, never zero. `flame` uses the hardware's
/// inverted polarity: `0` means a flame is detected, anything else is clear.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SensorReading {
    pub device_id: String,
    /// Parts per million
    pub gas: Option<f64>,
    /// Degrees Celsius
    pub temp: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// `0` = flame detected, non-zero = clear
    pub flame: Option<i32>,
    /// Capture time on the device, not receipt time.
    pub time: DateTime<Utc>,
}

impl SensorReading {
    /// `true` only when a flame value is present and equals `0`.
    pub fn flame_detected(&self) -> bool {
        self.flame == Some(0)
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Per-device alerting configuration, one row per `device_id` in
/// `device_settings`. `location` is joined in from `devices`.
///
/// Warning thresholds are expected to sit at or below their danger
/// counterparts but nothing enforces it.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct DeviceThresholdConfig {
    pub device_id: String,
    pub gas_warning_threshold: f64,
    pub gas_danger_threshold: f64,
    pub temp_warning_threshold: f64,
    pub temp_danger_threshold: f64,
    pub humidity_warning_threshold: f64,
    pub humidity_danger_threshold: f64,
    pub enable_gas_alerts: bool,
    pub enable_temp_alerts: bool,
    pub enable_flame_alerts: bool,
    /// Minimum spacing between two alerts for this device.
    pub alert_cooldown_seconds: i32,
    #[sqlx(default)]
    pub location: Option<String>,
}

impl DeviceThresholdConfig {
    /// Cooldown in milliseconds. Negative values are treated as no cooldown.
    pub fn cooldown_ms(&self) -> i64 {
        i64::from(self.alert_cooldown_seconds.max(0)) * 1000
    }
}

impl Default for DeviceThresholdConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            gas_warning_threshold: 300.0,
            gas_danger_threshold: 500.0,
            temp_warning_threshold: 35.0,
            temp_danger_threshold: 45.0,
            humidity_warning_threshold: 70.0,
            humidity_danger_threshold: 85.0,
            enable_gas_alerts: true,
            enable_temp_alerts: true,
            enable_flame_alerts: true,
            alert_cooldown_seconds: 60,
            location: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// An incident emitted by the threshold monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub device_id: String,
    pub message: String,
    pub severity: Severity,
    pub gas: Option<f64>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub flame: Option<i32>,
    /// Evaluation time, not reading time.
    pub time: DateTime<Utc>,
    pub location: Option<String>,
    /// Best-effort recipient for downstream email delivery.
    pub email: String,
}

/// An alert as held by the system of record, including acknowledgement
/// state managed outside the monitor.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub device_id: String,
    pub message: String,
    pub severity: Severity,
    pub gas: Option<f64>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub flame: Option<i32>,
    pub time: DateTime<Utc>,
    pub location: Option<String>,
    pub email: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

impl AlertRecord {
    /// Wrap a freshly emitted alert as a new, unacknowledged record.
    pub fn new(alert: Alert) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: alert.device_id,
            message: alert.message,
            severity: alert.severity,
            gas: alert.gas,
            temp: alert.temp,
            humidity: alert.humidity,
            flame: alert.flame,
            time: alert.time,
            location: alert.location,
            email: alert.email,
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Device status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    /// A device is online while its last reading is younger than `stale_after`.
    pub fn from_last_seen(
        last_seen: DateTime<Utc>,
        now: DateTime<Utc>,
        stale_after: chrono::Duration,
    ) -> Self {
        if now - last_seen < stale_after {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }
}
