use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use tracing::warn;
use utoipa::OpenApi;
use uuid::Uuid;

use super::{
    dto::{
        AcknowledgeAllResponse, AcknowledgeRequest, AlertDto, AlertQuery, DeviceStatusDto,
        EvaluationDto, Outcome, ReadingRequest, ThresholdsRequest,
    },
    errors::AppError,
    AppState,
};
use crate::db::models::{Alert, DeviceStatus, DeviceThresholdConfig, SensorReading, Severity};

const DEFAULT_ALERT_LIMIT: i64 = 50;
const MAX_ALERT_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Submit one sensor reading. The reading is stored and evaluated against the
/// device's thresholds; the response says whether an alert was emitted.
#[utoipa::path(
    post,
    path = "/readings",
    request_body = ReadingRequest,
    responses(
        (status = 200, description = "Reading stored and evaluated", body = EvaluationDto),
        (status = 422, description = "Empty device_id"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn post_reading(
    State(state): State<AppState>,
    Json(req): Json<ReadingRequest>,
) -> Result<Json<EvaluationDto>, AppError> {
    if req.device_id.trim().is_empty() {
        return Err(AppError::Unprocessable("device_id must not be empty".into()));
    }
    let outcome = state.ingest.ingest(req.into_reading(Utc::now())).await?;
    Ok(Json(outcome.into()))
}

/// Latest reading per device, from the in-memory cache.
#[utoipa::path(
    get,
    path = "/readings/latest",
    responses(
        (status = 200, description = "Latest reading per device", body = Vec<SensorReading>),
    ),
    tag = "readings"
)]
pub async fn get_latest_readings(State(state): State<AppState>) -> Json<Vec<SensorReading>> {
    Json(state.cache.all().await)
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Online/offline status of every device that has reported since start-up,
/// judged by when its last reading arrived.
#[utoipa::path(
    get,
    path = "/devices/status",
    responses(
        (status = 200, description = "Device status", body = Vec<DeviceStatusDto>),
    ),
    tag = "devices"
)]
pub async fn get_device_status(State(state): State<AppState>) -> Json<Vec<DeviceStatusDto>> {
    let now = Utc::now();
    let statuses = state
        .cache
        .last_seen()
        .await
        .into_iter()
        .map(|(device_id, last_seen)| DeviceStatusDto {
            status: DeviceStatus::from_last_seen(last_seen, now, state.offline_after),
            device_id,
            last_seen,
        })
        .collect();
    Json(statuses)
}

/// Fetch the threshold configuration of a device.
#[utoipa::path(
    get,
    path = "/devices/{device_id}/thresholds",
    params(
        ("device_id" = String, Path, description = "Device ID"),
    ),
    responses(
        (status = 200, description = "Threshold configuration", body = DeviceThresholdConfig),
        (status = 404, description = "Device has no configuration"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "devices"
)]
pub async fn get_thresholds(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceThresholdConfig>, AppError> {
    state
        .configs
        .get_config(&device_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no thresholds configured for {device_id}")))
}

/// Create or replace the threshold configuration of a device.
///
/// Threshold ordering is not enforced; a negative cooldown is rejected.
#[utoipa::path(
    put,
    path = "/devices/{device_id}/thresholds",
    params(
        ("device_id" = String, Path, description = "Device ID"),
    ),
    request_body = ThresholdsRequest,
    responses(
        (status = 200, description = "Stored configuration", body = DeviceThresholdConfig),
        (status = 422, description = "Negative alert_cooldown_seconds"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "devices"
)]
pub async fn put_thresholds(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(req): Json<ThresholdsRequest>,
) -> Result<Json<DeviceThresholdConfig>, AppError> {
    if req.alert_cooldown_seconds < 0 {
        return Err(AppError::Unprocessable(
            "alert_cooldown_seconds must not be negative".into(),
        ));
    }
    let config = req.into_config(device_id);
    for (sensor, warning, danger) in [
        ("gas", config.gas_warning_threshold, config.gas_danger_threshold),
        ("temp", config.temp_warning_threshold, config.temp_danger_threshold),
        ("humidity", config.humidity_warning_threshold, config.humidity_danger_threshold),
    ] {
        if warning > danger {
            warn!(
                device_id = %config.device_id,
                sensor,
                warning,
                danger,
                "Warning threshold is above danger threshold"
            );
        }
    }

    state.configs.upsert_config(&config).await?;
    let stored = state.configs.get_config(&config.device_id).await?.unwrap_or(config);
    Ok(Json(stored))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// List alerts, newest first.
#[utoipa::path(
    get,
    path = "/alerts",
    params(AlertQuery),
    responses(
        (status = 200, description = "Alerts", body = Vec<AlertDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertQuery>,
) -> Result<Json<Vec<AlertDto>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_ALERT_LIMIT).clamp(1, MAX_ALERT_LIMIT);
    let rows = state.alerts.list(params.device_id.as_deref(), limit).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Acknowledge a single alert.
#[utoipa::path(
    post,
    path = "/alerts/{id}/acknowledge",
    params(
        ("id" = Uuid, Path, description = "Alert ID"),
    ),
    request_body(content = AcknowledgeRequest, description = "Optional acknowledging user"),
    responses(
        (status = 200, description = "Acknowledged alert", body = AlertDto),
        (status = 404, description = "No such alert"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<AcknowledgeRequest>>,
) -> Result<Json<AlertDto>, AppError> {
    let by = body.and_then(|Json(b)| b.acknowledged_by);
    state
        .alerts
        .acknowledge(id, by.as_deref(), Utc::now())
        .await?
        .map(|a| Json(a.into()))
        .ok_or_else(|| AppError::NotFound(format!("alert {id} not found")))
}

/// Acknowledge every unacknowledged alert.
#[utoipa::path(
    post,
    path = "/alerts/acknowledge",
    request_body(content = AcknowledgeRequest, description = "Optional acknowledging user"),
    responses(
        (status = 200, description = "Number of alerts acknowledged", body = AcknowledgeAllResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn acknowledge_all_alerts(
    State(state): State<AppState>,
    body: Option<Json<AcknowledgeRequest>>,
) -> Result<Json<AcknowledgeAllResponse>, AppError> {
    let by = body.and_then(|Json(b)| b.acknowledged_by);
    let acknowledged = state.alerts.acknowledge_all(by.as_deref(), Utc::now()).await?;
    Ok(Json(AcknowledgeAllResponse { acknowledged }))
}

/// Delete an alert.
#[utoipa::path(
    delete,
    path = "/alerts/{id}",
    params(
        ("id" = Uuid, Path, description = "Alert ID"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such alert"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    if state.alerts.delete(id).await? {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("alert {id} not found")))
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        post_reading,
        get_latest_readings,
        get_device_status,
        get_thresholds,
        put_thresholds,
        list_alerts,
        acknowledge_alert,
        acknowledge_all_alerts,
        delete_alert,
        health,
    ),
    components(schemas(
        ReadingRequest,
        EvaluationDto,
        Outcome,
        Alert,
        Severity,
        SensorReading,
        DeviceThresholdConfig,
        ThresholdsRequest,
        DeviceStatus,
        DeviceStatusDto,
        AlertDto,
        AcknowledgeRequest,
        AcknowledgeAllResponse,
    )),
    tags(
        (name = "readings", description = "Sensor reading ingest"),
        (name = "devices",  description = "Device thresholds and status"),
        (name = "alerts",   description = "Emitted alerts"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "FireGuard Alert API",
        version = "0.1.0",
        description = "Threshold monitoring and alerting for FireGuard fire-safety sensors"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
