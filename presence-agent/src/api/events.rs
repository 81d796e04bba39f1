//! Server-sent presence notices.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(stream_events))
}

/// GET /v1/events - Peers coming online or going away, plus listener failures.
async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.notices.subscribe()).filter_map(|delivery| {
        match delivery {
            Ok(notice) => match Event::default().event("notice").json_data(&notice) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!("Failed to encode notice: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!("Notice reader lagged, {} notices dropped", missed);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
