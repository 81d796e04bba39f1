//! Live tracking sessions streamed as server-sent events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::Router;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/track/:id", get(track))
        .route("/sessions/:session_id/suspend", post(suspend))
        .route("/sessions/:session_id/resume", post(resume))
}

#[derive(Debug, Deserialize)]
struct TrackQuery {
    /// Title for the target's marker; the stored name is used when missing.
    name: Option<String>,
}

/// First event of every tracking stream.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionOpened {
    session_id: String,
    target_id: String,
}

/// GET /v1/track/{id} - Follow one peer.
///
/// Unknown or malformed ids fail before the stream starts. Once streaming,
/// the session lives until the client disconnects. The `opened` event carries
/// the id for `/v1/sessions/{session_id}/suspend` and `/resume`.
async fn track(
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let target_name = query.name.unwrap_or_default();
    let handle = state.driver.open(&target_id, &target_name).await?;
    let (control, events) = handle.split();
    let session_id = state.register_session(control).await;

    let opened = SessionOpened {
        session_id,
        target_id,
    };
    let stream = tokio_stream::iter(encode("opened", &opened))
        .chain(ReceiverStream::new(events).filter_map(|event| encode("session", &event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /v1/sessions/{session_id}/suspend - Withhold view updates.
async fn suspend(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    let control = state
        .session(&session_id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    if !control.suspend().await {
        return Err(ApiError::SessionNotFound(session_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/sessions/{session_id}/resume - Re-emit the current view and continue.
async fn resume(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    let control = state
        .session(&session_id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    if !control.resume().await {
        return Err(ApiError::SessionNotFound(session_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn encode<T: Serialize>(name: &str, value: &T) -> Option<std::result::Result<Event, Infallible>> {
    match Event::default().event(name).json_data(value) {
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            tracing::warn!("Failed to encode {} event: {}", name, e);
            None
        }
    }
}
