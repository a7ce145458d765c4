pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    ingest::IngestService,
    ports::{AlertRepository, ConfigStore},
    reading_cache::ReadingCache,
};
use handlers::ApiDoc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub configs: Arc<dyn ConfigStore>,
    pub alerts: Arc<dyn AlertRepository>,
    pub cache: ReadingCache,
    /// Silence after which `/devices/status` reports a device offline.
    pub offline_after: chrono::Duration,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/readings", post(handlers::post_reading))
        .route("/readings/latest", get(handlers::get_latest_readings))
        .route("/devices/status", get(handlers::get_device_status))
        .route(
            "/devices/{device_id}/thresholds",
            get(handlers::get_thresholds).put(handlers::put_thresholds),
        )
        .route("/alerts", get(handlers::list_alerts))
        .route("/alerts/acknowledge", post(handlers::acknowledge_all_alerts))
        .route("/alerts/{id}/acknowledge", post(handlers::acknowledge_alert))
        .route("/alerts/{id}", delete(handlers::delete_alert))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
