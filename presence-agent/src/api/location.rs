//! Device location fed in by the client shell.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use presence_common::Coordinate;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/location", put(set_location).delete(clear_location))
}

#[derive(Debug, Deserialize)]
struct LocationRequest {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<LocationRequest> for Coordinate {
    type Error = ApiError;

    fn try_from(request: LocationRequest) -> Result<Self> {
        let valid_latitude = (-90.0..=90.0).contains(&request.latitude);
        let valid_longitude = (-180.0..=180.0).contains(&request.longitude);
        if !valid_latitude || !valid_longitude {
            return Err(ApiError::InvalidRequest(format!(
                "coordinate out of range: {}, {}",
                request.latitude, request.longitude
            )));
        }
        Ok(Coordinate::new(request.latitude, request.longitude))
    }
}

/// PUT /v1/location - Latest fix of this device.
async fn set_location(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LocationRequest>,
) -> Result<StatusCode> {
    let fix = Coordinate::try_from(request)?;
    state.location.push(fix);
    tracing::debug!("Local fix {}", fix);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/location - The device lost its fix.
async fn clear_location(State(state): State<Arc<AppState>>) -> StatusCode {
    state.location.clear();
    StatusCode::NO_CONTENT
}
