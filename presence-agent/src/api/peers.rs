//! Available peers.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use presence_tracker::RosterEntry;
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/peers", get(list_peers))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PeersResponse {
    /// False until the first snapshot of the collection arrived.
    loaded: bool,
    peers: Vec<PeerView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PeerView {
    id: String,
    display_name: String,
    email: Option<String>,
    image_url: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<&RosterEntry> for PeerView {
    fn from(entry: &RosterEntry) -> Self {
        let position = entry.record.coordinate();
        Self {
            id: entry.id.clone(),
            display_name: entry.display_name(),
            email: entry.record.email.clone(),
            image_url: entry.record.image_url.clone(),
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
        }
    }
}

/// GET /v1/peers - Available peers other than the local user.
async fn list_peers(State(state): State<Arc<AppState>>) -> Json<PeersResponse> {
    let roster = state.roster.read().await;
    Json(PeersResponse {
        loaded: roster.is_loaded(),
        peers: roster.entries().iter().map(PeerView::from).collect(),
    })
}
