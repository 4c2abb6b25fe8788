//! HTTP API module.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use envsense_hw::RawSample;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::acquisition::{CoreError, SensorReading};
use crate::state::AppState;

/// Health summary.
#[derive(Serialize)]
struct Health {
    status: &'static str,
    time: String,
    uptime_secs: u64,
    sensors: usize,
    faulted: Vec<String>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match self {
            CoreError::UnknownSensor(_) => StatusCode::NOT_FOUND,
            CoreError::DuplicateSensor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sensors", get(list_sensors))
        .route("/sensors/:id", get(read_sensor))
        .route("/sensors/:id/samples", get(read_samples))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health - Daemon and sensor health
async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let faulted = state
        .list_sensors()
        .into_iter()
        .filter(|id| state.read(id).map(|r| r.faulted).unwrap_or(false))
        .collect();

    Json(Health {
        status: "ok",
        time: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.uptime_secs(),
        sensors: state.sensor_count(),
        faulted,
    })
}

/// GET /sensors - Configured sensor ids
async fn list_sensors(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.list_sensors())
}

/// GET /sensors/:id - Latest samples with staleness and fault status
async fn read_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SensorReading>, CoreError> {
    debug!("HTTP: read {}", id);
    state.read(&id).map(Json)
}

/// GET /sensors/:id/samples - Bare sample list, most recent last
async fn read_samples(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RawSample>>, CoreError> {
    state.read(&id).map(|reading| Json(reading.samples))
}
