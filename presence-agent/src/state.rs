//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use presence_tracker::{
    PresenceStore, PresenceTransition, Roster, SessionControl, SessionDriver, StatusController,
    TransitionKind, WatchLocation,
};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::config::Config;

/// Notices kept for slow `/v1/events` readers before they start lagging.
const NOTICE_BUFFER: usize = 64;

/// A user-facing notice pushed to every `/v1/events` reader.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            user_id: None,
            at: Utc::now(),
        }
    }
}

impl From<&PresenceTransition> for Notice {
    fn from(transition: &PresenceTransition) -> Self {
        let kind = match transition.kind {
            TransitionKind::BecameAvailable => "became_available",
            TransitionKind::BecameUnavailable => "became_unavailable",
        };
        Self {
            kind: kind.to_string(),
            message: transition.notice(),
            user_id: Some(transition.user_id.clone()),
            at: transition.observed_at,
        }
    }
}

/// Shared application state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn PresenceStore>,
    pub location: Arc<WatchLocation>,
    pub status: Mutex<StatusController>,
    pub roster: RwLock<Roster>,
    pub notices: broadcast::Sender<Notice>,
    pub driver: SessionDriver,
    /// Streamed tracking sessions by session id, for suspend/resume.
    pub sessions: RwLock<HashMap<String, SessionControl>>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn PresenceStore>) -> Self {
        let location = Arc::new(WatchLocation::new(config.location.initial_fix()));
        let driver = SessionDriver::new(
            store.clone(),
            location.clone(),
            config.location_interval(),
            config.tracking.fallback_center(),
        );
        let status = StatusController::new(store.clone(), config.agent.user_id.clone());
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);

        Self {
            config,
            store,
            location,
            status: Mutex::new(status),
            roster: RwLock::new(Roster::default()),
            notices,
            driver,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.config.agent.user_id
    }

    /// Remember a streamed session's control under a fresh id.
    pub async fn register_session(&self, control: SessionControl) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, control| !control.is_closed());
        sessions.insert(id.clone(), control);
        id
    }

    /// Control of a session that is still running.
    pub async fn session(&self, id: &str) -> Option<SessionControl> {
        let control = self.sessions.read().await.get(id).cloned()?;
        if control.is_closed() {
            self.sessions.write().await.remove(id);
            return None;
        }
        Some(control)
    }

    /// Push a notice to whoever is listening. Nobody listening is fine.
    pub fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}
