//! HTTP API of the presence agent.

pub mod events;
pub mod health;
pub mod location;
pub mod peers;
pub mod status;
pub mod track;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(peers::router())
        .merge(status::router())
        .merge(location::router())
        .merge(events::router())
        .merge(track::router())
}

/// Full application: `/health` plus the API nested under `/v1`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/v1", router())
        .route("/health", axum::routing::get(health::health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body, BodyDataStream};
    use axum::http::{header, Method, Request, StatusCode};
    use futures_util::StreamExt;
    use presence_common::{Coordinate, PresenceSnapshot, PresenceStatus, UserRecord};
    use presence_tracker::{LocationSource, MemoryStore, PresenceStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{AgentConfig, Config};

    fn test_config() -> Config {
        Config {
            agent: AgentConfig {
                user_id: "me".to_string(),
            },
            api: Default::default(),
            store: Default::default(),
            location: Default::default(),
            tracking: Default::default(),
            logging: Default::default(),
        }
    }

    fn user(first: &str, status: PresenceStatus, at: Option<(f64, f64)>) -> UserRecord {
        UserRecord {
            first_name: Some(first.to_string()),
            email: Some(format!("{}@example.com", first.to_lowercase())),
            latitude: at.map(|p| p.0),
            longitude: at.map(|p| p.1),
            status,
            ..Default::default()
        }
    }

    fn setup(users: Vec<(&str, UserRecord)>) -> (MemoryStore, Arc<AppState>) {
        let store = MemoryStore::with_users(
            users
                .into_iter()
                .map(|(id, record)| (id.to_string(), record)),
        );
        let state = Arc::new(AppState::new(test_config(), Arc::new(store.clone())));
        (store, state)
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let (_, state) = setup(vec![]);
        let (status, body) = send(app(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "store": "memory"}));
    }

    #[tokio::test]
    async fn test_peers_lists_roster_entries() {
        let (_, state) = setup(vec![]);
        let snapshot = PresenceSnapshot::new(vec![
            (
                "me".to_string(),
                user("Self", PresenceStatus::Available, None),
            ),
            (
                "ana".to_string(),
                user("Ana", PresenceStatus::Available, Some((4.66, -74.09))),
            ),
            (
                "luis".to_string(),
                user("Luis", PresenceStatus::Disconnected, None),
            ),
        ]);
        state.roster.write().await.update(&snapshot, "me");

        let (status, body) = send(app(state), Method::GET, "/v1/peers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loaded"], true);
        let peers = body["peers"].as_array().unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0]["id"], "ana");
        assert_eq!(peers[0]["displayName"], "Ana");
        assert_eq!(peers[0]["email"], "ana@example.com");
        assert_eq!(peers[0]["latitude"], 4.66);
    }

    #[tokio::test]
    async fn test_peers_not_loaded_before_first_snapshot() {
        let (_, state) = setup(vec![]);
        let (_, body) = send(app(state), Method::GET, "/v1/peers", None).await;
        assert_eq!(body, json!({"loaded": false, "peers": []}));
    }

    #[tokio::test]
    async fn test_toggle_and_logout_write_status() {
        let (store, state) = setup(vec![(
            "me",
            user("Self", PresenceStatus::Disconnected, None),
        )]);

        let (status, body) =
            send(app(state.clone()), Method::POST, "/v1/status/toggle", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "available");
        assert_eq!(body["notice"], "Ahora estás disponible");
        let stored = store.read_user("me").await.unwrap().unwrap();
        assert_eq!(stored.status, PresenceStatus::Available);

        let (_, body) = send(app(state.clone()), Method::GET, "/v1/status", None).await;
        assert_eq!(body["status"], "available");
        assert_eq!(body["userId"], "me");

        let (status, body) = send(app(state), Method::POST, "/v1/logout", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "disconnected");
        let stored = store.read_user("me").await.unwrap().unwrap();
        assert_eq!(stored.status, PresenceStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_register_starts_disconnected() {
        let (store, state) = setup(vec![]);
        let body = json!({"firstName": "Eva", "email": "eva@example.com", "status": "available"});

        let (status, response) = send(app(state), Method::POST, "/v1/register", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "disconnected");

        let stored = store.read_user("me").await.unwrap().unwrap();
        assert_eq!(stored.first_name.as_deref(), Some("Eva"));
        assert_eq!(stored.status, PresenceStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_location_validates_range() {
        let (_, state) = setup(vec![]);

        let body = json!({"latitude": 4.65, "longitude": -74.08});
        let (status, _) = send(app(state.clone()), Method::PUT, "/v1/location", Some(body)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            state.location.get_location().await,
            Some(Coordinate::new(4.65, -74.08))
        );

        let body = json!({"latitude": 95.0, "longitude": 0.0});
        let (status, error) =
            send(app(state.clone()), Method::PUT, "/v1/location", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["type"], "invalid_request");

        let (status, _) = send(app(state.clone()), Method::DELETE, "/v1/location", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.location.get_location().await, None);
    }

    #[tokio::test]
    async fn test_track_unknown_target_is_not_found() {
        let (store, state) = setup(vec![]);
        let (status, body) = send(app(state), Method::GET, "/v1/track/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "target_not_found");
        assert_eq!(store.active_listeners(), 0);
    }

    /// Append stream output to `seen` until `needle` shows up.
    async fn read_until(body: &mut BodyDataStream, seen: &mut String, needle: &str) {
        while !seen.contains(needle) {
            let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), body.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            seen.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    async fn open_track(state: Arc<AppState>, uri: &str) -> BodyDataStream {
        let response = app(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        response.into_body().into_data_stream()
    }

    fn session_id(seen: &str) -> String {
        let start = seen.find("\"sessionId\":\"").unwrap() + "\"sessionId\":\"".len();
        let len = seen[start..].find('"').unwrap();
        seen[start..start + len].to_string()
    }

    #[tokio::test]
    async fn test_track_streams_session_events() {
        let (_, state) = setup(vec![(
            "ana",
            user("Ana", PresenceStatus::Available, Some((4.66, -74.09))),
        )]);

        let mut body = open_track(state, "/v1/track/ana").await;
        let mut seen = String::new();
        read_until(&mut body, &mut seen, "target_marker_placed").await;

        assert!(seen.starts_with("event: opened"));
        assert!(seen.contains("\"targetId\":\"ana\""));
        assert!(seen.contains("event: session"));
        assert!(seen.contains("\"title\":\"Ana\""));
    }

    #[tokio::test]
    async fn test_streamed_session_can_be_suspended_and_resumed() {
        let (_, state) = setup(vec![(
            "ana",
            user("Ana", PresenceStatus::Available, Some((4.66, -74.09))),
        )]);

        let mut body = open_track(state.clone(), "/v1/track/ana?name=Ana%20R").await;
        let mut seen = String::new();
        read_until(&mut body, &mut seen, "target_marker_placed").await;
        assert!(seen.contains("\"title\":\"Ana R\""));
        let id = session_id(&seen);

        let uri = format!("/v1/sessions/{}/suspend", id);
        let (status, _) = send(app(state.clone()), Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        read_until(&mut body, &mut seen, "\"phase\":\"suspended\"").await;

        let uri = format!("/v1/sessions/{}/resume", id);
        let (status, _) = send(app(state.clone()), Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        read_until(&mut body, &mut seen, "target_marker_moved").await;

        // Closing the stream ends the session and forgets its id.
        drop(body);
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while state.session(&id).await.is_some() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        let (status, error) = send(app(state), Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"]["type"], "session_not_found");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_, state) = setup(vec![]);
        let uri = "/v1/sessions/nope/suspend";
        let (status, _) = send(app(state), Method::POST, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
