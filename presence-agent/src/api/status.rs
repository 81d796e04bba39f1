//! The local user's own presence status.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use presence_common::{PresenceStatus, UserRecord};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/status/toggle", post(toggle_status))
        .route("/logout", post(logout))
        .route("/register", post(register))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    user_id: String,
    status: PresenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

/// GET /v1/status - Status as last read from or written to the store.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.status.lock().await;
    Json(StatusResponse {
        user_id: status.user_id().to_string(),
        status: status.current(),
        notice: None,
    })
}

/// POST /v1/status/toggle - Flip between available and disconnected.
async fn toggle_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let mut status = state.status.lock().await;
    let change = status.toggle().await?;
    Ok(Json(StatusResponse {
        user_id: status.user_id().to_string(),
        status: change.status,
        notice: Some(change.notice),
    }))
}

/// POST /v1/logout - Go offline before leaving.
async fn logout(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let mut status = state.status.lock().await;
    status.go_offline().await?;
    Ok(Json(StatusResponse {
        user_id: status.user_id().to_string(),
        status: status.current(),
        notice: None,
    }))
}

/// POST /v1/register - Store the local user's profile; starts out disconnected.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(record): Json<UserRecord>,
) -> Result<Json<StatusResponse>> {
    let mut status = state.status.lock().await;
    status.register(record).await?;
    Ok(Json(StatusResponse {
        user_id: status.user_id().to_string(),
        status: status.current(),
        notice: None,
    }))
}
