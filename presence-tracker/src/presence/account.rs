//! The local user's own record: status toggling and position publishing.

use std::sync::Arc;

use presence_common::{Coordinate, PresenceStatus, UserRecord};

use crate::error::Result;
use crate::store::{PresenceStore, Subscription};

/// Outcome of a status toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: PresenceStatus,
    pub notice: String,
}

/// Owns the local user's presence status.
pub struct StatusController {
    store: Arc<dyn PresenceStore>,
    user_id: String,
    current: PresenceStatus,
}

impl StatusController {
    pub fn new(store: Arc<dyn PresenceStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            current: PresenceStatus::Disconnected,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn current(&self) -> PresenceStatus {
        self.current
    }

    /// Read the stored status. A missing record counts as disconnected.
    pub async fn load(&mut self) -> Result<PresenceStatus> {
        let record = self.store.read_user(&self.user_id).await?;
        self.current = record.map(|r| r.status).unwrap_or_default();
        Ok(self.current)
    }

    /// Flip between available and disconnected.
    pub async fn toggle(&mut self) -> Result<StatusChange> {
        let next = self.current.toggled();
        self.store.write_status(&self.user_id, next).await?;
        self.current = next;
        tracing::info!("Status of {} is now {}", self.user_id, next);

        let notice = match next {
            PresenceStatus::Available => "Ahora estás disponible",
            PresenceStatus::Disconnected => "Ahora estás desconectado",
        };
        Ok(StatusChange {
            status: next,
            notice: notice.to_string(),
        })
    }

    /// Force the status to disconnected, as on logout.
    pub async fn go_offline(&mut self) -> Result<()> {
        self.store
            .write_status(&self.user_id, PresenceStatus::Disconnected)
            .await?;
        self.current = PresenceStatus::Disconnected;
        tracing::info!("{} went offline", self.user_id);
        Ok(())
    }

    /// Create the user's record. New users always start disconnected.
    pub async fn register(&mut self, mut record: UserRecord) -> Result<()> {
        record.status = PresenceStatus::Disconnected;
        self.store.write_user(&self.user_id, &record).await?;
        self.current = PresenceStatus::Disconnected;
        tracing::info!("Registered {}", self.user_id);
        Ok(())
    }
}

/// Writes the device's own fixes into its user record.
pub struct PositionPublisher {
    store: Arc<dyn PresenceStore>,
    user_id: String,
    last_published: Option<Coordinate>,
}

impl PositionPublisher {
    pub fn new(store: Arc<dyn PresenceStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            last_published: None,
        }
    }

    /// Publish `fix` unless it is the one already stored. Returns whether a write happened.
    pub async fn publish(&mut self, fix: Coordinate) -> Result<bool> {
        if self.last_published == Some(fix) {
            return Ok(false);
        }
        self.store.write_position(&self.user_id, fix).await?;
        self.last_published = Some(fix);
        tracing::debug!("Published position {} for {}", fix, self.user_id);
        Ok(true)
    }

    /// Publish every fix delivered by `fixes` until the feed ends.
    ///
    /// Write failures are logged and the next fix is tried again.
    pub async fn run(mut self, mut fixes: Subscription<Option<Coordinate>>) {
        while let Some(delivery) = fixes.next().await {
            let Ok(Some(fix)) = delivery else {
                continue;
            };
            if let Err(e) = self.publish(fix).await {
                tracing::warn!("Failed to publish position for {}: {}", self.user_id, e);
            }
        }
        fixes.unsubscribe().await;
    }
}
