//! Axum request handlers.

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::controller::ScanState;
use crate::device::DetectedDevice;
use crate::registry::DEFAULT_WINDOW;
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `?last=<seconds>` staleness window.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub last: Option<String>,
}

impl WindowQuery {
    /// Absent or empty means the default window; anything else must be a
    /// whole, non-negative number of seconds.
    pub fn window(&self) -> ApiResult<Duration> {
        match self.last.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_WINDOW),
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ApiError::InvalidQueryParameter {
                    name: "last",
                    reason: format!("expected whole seconds, got '{raw}'"),
                }
            }),
        }
    }
}

/// Response of start/stop/status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: ScanState,
    pub message: String,
    /// Addresses seen since startup, live or not.
    pub devices: usize,
}

impl StatusResponse {
    fn new(state: &AppState, message: impl Into<String>) -> Self {
        Self {
            state: state.controller.state(),
            message: message.into(),
            devices: state.registry.len(),
        }
    }
}

/// `GET /devices?last=N`: live devices, strongest signal first.
#[tracing::instrument(skip(state))]
pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<Vec<DetectedDevice>>> {
    let window = query.window()?;
    Ok(Json(state.registry.list_live(window)))
}

/// `GET /beacons?last=N`: live beacons in first-seen order.
#[tracing::instrument(skip(state))]
pub async fn list_beacons(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<Vec<DetectedDevice>>> {
    let window = query.window()?;
    let beacons = state
        .registry
        .list_since(window)
        .into_iter()
        .filter(DetectedDevice::is_beacon)
        .collect();
    Ok(Json(beacons))
}

/// `POST /start`
pub async fn start_scan(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.controller.start()?;
    Ok(Json(StatusResponse::new(
        &state,
        "Request to start scanning accepted.",
    )))
}

/// `POST /stop`
pub async fn stop_scan(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.controller.stop()?;
    Ok(Json(StatusResponse::new(
        &state,
        "Request to stop scanning accepted.",
    )))
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let message = match state.controller.state() {
        ScanState::Scanning => "Scanning.",
        ScanState::Stopped => "Stopped.",
    };
    Json(StatusResponse::new(&state, message))
}
