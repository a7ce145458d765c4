use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    db::models::{Alert, AlertRecord, DeviceStatus, DeviceThresholdConfig, SensorReading, Severity},
    monitor::{Evaluation, SuppressReason},
};

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Request body for `POST /readings`, as sent by an ESP32 device.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadingRequest {
    pub device_id: String,
    /// Parts per million
    pub gas: Option<f64>,
    /// Degrees Celsius
    pub temp: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// `0` = flame detected, non-zero = clear
    pub flame: Option<i32>,
    /// Capture time (RFC3339). Defaults to receipt time.
    pub time: Option<DateTime<Utc>>,
}

impl ReadingRequest {
    pub fn into_reading(self, received_at: DateTime<Utc>) -> SensorReading {
        SensorReading {
            device_id: self.device_id.trim().to_owned(),
            gas: self.gas,
            temp: self.temp,
            humidity: self.humidity,
            flame: self.flame,
            time: self.time.unwrap_or(received_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Emitted,
    Suppressed,
    Failed,
}

/// Response for `POST /readings`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluationDto {
    pub outcome: Outcome,
    /// Why nothing was emitted: `no_config`, `cooldown` or `nothing_fired`.
    pub reason: Option<String>,
    /// Milliseconds left on the device's cooldown, when suppressed by it.
    pub cooldown_remaining_ms: Option<i64>,
    pub alert: Option<Alert>,
    pub error: Option<String>,
}

impl From<Evaluation> for EvaluationDto {
    fn from(e: Evaluation) -> Self {
        let empty = Self {
            outcome: Outcome::Suppressed,
            reason: None,
            cooldown_remaining_ms: None,
            alert: None,
            error: None,
        };
        match e {
            Evaluation::Emitted(alert) => Self {
                outcome: Outcome::Emitted,
                alert: Some(alert),
                ..empty
            },
            Evaluation::Suppressed(reason) => Self {
                reason: Some(reason.to_string()),
                cooldown_remaining_ms: match reason {
                    SuppressReason::Cooldown { remaining_ms } => Some(remaining_ms),
                    _ => None,
                },
                ..empty
            },
            Evaluation::Failed(err) => Self {
                outcome: Outcome::Failed,
                error: Some(err.to_string()),
                ..empty
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Request body for `PUT /devices/{device_id}/thresholds`.
/// Omitted fields take the factory defaults.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(default)]
pub struct ThresholdsRequest {
    pub gas_warning_threshold: f64,
    pub gas_danger_threshold: f64,
    pub temp_warning_threshold: f64,
    pub temp_danger_threshold: f64,
    pub humidity_warning_threshold: f64,
    pub humidity_danger_threshold: f64,
    pub enable_gas_alerts: bool,
    pub enable_temp_alerts: bool,
    pub enable_flame_alerts: bool,
    pub alert_cooldown_seconds: i32,
}

impl Default for ThresholdsRequest {
    fn default() -> Self {
        let d = DeviceThresholdConfig::default();
        Self {
            gas_warning_threshold: d.gas_warning_threshold,
            gas_danger_threshold: d.gas_danger_threshold,
            temp_warning_threshold: d.temp_warning_threshold,
            temp_danger_threshold: d.temp_danger_threshold,
            humidity_warning_threshold: d.humidity_warning_threshold,
            humidity_danger_threshold: d.humidity_danger_threshold,
            enable_gas_alerts: d.enable_gas_alerts,
            enable_temp_alerts: d.enable_temp_alerts,
            enable_flame_alerts: d.enable_flame_alerts,
            alert_cooldown_seconds: d.alert_cooldown_seconds,
        }
    }
}

impl ThresholdsRequest {
    pub fn into_config(self, device_id: String) -> DeviceThresholdConfig {
        DeviceThresholdConfig {
            device_id,
            gas_warning_threshold: self.gas_warning_threshold,
            gas_danger_threshold: self.gas_danger_threshold,
            temp_warning_threshold: self.temp_warning_threshold,
            temp_danger_threshold: self.temp_danger_threshold,
            humidity_warning_threshold: self.humidity_warning_threshold,
            humidity_danger_threshold: self.humidity_danger_threshold,
            enable_gas_alerts: self.enable_gas_alerts,
            enable_temp_alerts: self.enable_temp_alerts,
            enable_flame_alerts: self.enable_flame_alerts,
            alert_cooldown_seconds: self.alert_cooldown_seconds,
            location: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceStatusDto {
    pub device_id: String,
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertQuery {
    /// Only alerts for this device.
    pub device_id: Option<String>,
    /// Maximum number of alerts, newest first. Defaults to 50, capped at 500.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertDto {
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

impl From<AlertRecord> for AlertDto {
    fn from(a: AlertRecord) -> Self {
        Self {
            id: a.id,
            device_id: a.device_id,
            message: a.message,
            severity: a.severity,
            gas: a.gas,
            temp: a.temp,
            humidity: a.humidity,
            flame: a.flame,
            time: a.time,
            location: a.location,
            email: a.email,
            acknowledged: a.acknowledged,
            acknowledged_at: a.acknowledged_at,
            acknowledged_by: a.acknowledged_by,
        }
    }
}

/// Optional body for the acknowledge endpoints.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AcknowledgeRequest {
    pub acknowledged_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcknowledgeAllResponse {
    pub acknowledged: u64,
}
