//! Presence transitions derived from consecutive collection snapshots.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use presence_common::{PresenceSnapshot, PresenceStatus, UserRecord};
use serde::Serialize;

use crate::error::Result;
use crate::store::{PresenceStore, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    BecameAvailable,
    BecameUnavailable,
}

/// A peer whose availability flipped between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceTransition {
    pub user_id: String,
    pub kind: TransitionKind,
    pub record: UserRecord,
    pub observed_at: DateTime<Utc>,
}

impl PresenceTransition {
    /// Notification text for this transition.
    pub fn notice(&self) -> String {
        let name = self.record.display_name();
        match self.kind {
            TransitionKind::BecameAvailable => format!("{} se conectó", name),
            TransitionKind::BecameUnavailable => format!("{} se desconectó", name),
        }
    }
}

/// Diffs successive snapshots against the last status seen per user.
///
/// Users missing from a later snapshot are never visited, so a user removed
/// from the collection while available produces no transition.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    exclude_id: String,
    last_status: HashMap<String, PresenceStatus>,
}

impl PresenceTracker {
    /// `exclude_id` is the local user, whose own flips are not reported.
    pub fn new(exclude_id: impl Into<String>) -> Self {
        Self {
            exclude_id: exclude_id.into(),
            last_status: HashMap::new(),
        }
    }

    pub fn apply(&mut self, snapshot: &PresenceSnapshot) -> Vec<PresenceTransition> {
        let observed_at = Utc::now();
        let mut transitions = Vec::new();

        for (user_id, record) in snapshot.iter() {
            let old = self.last_status.insert(user_id.to_string(), record.status);
            if user_id == self.exclude_id {
                continue;
            }

            let was_available = old.is_some_and(|s| s.is_available());
            let kind = match (was_available, record.status.is_available()) {
                (false, true) => TransitionKind::BecameAvailable,
                (true, false) => TransitionKind::BecameUnavailable,
                _ => continue,
            };

            transitions.push(PresenceTransition {
                user_id: user_id.to_string(),
                kind,
                record: record.clone(),
                observed_at,
            });
        }

        transitions
    }

    /// Last status seen for `user_id`, if it was ever in a snapshot.
    pub fn last_status(&self, user_id: &str) -> Option<PresenceStatus> {
        self.last_status.get(user_id).copied()
    }
}

/// A tracker attached to the store's user collection.
///
/// Yields transitions one at a time. When the underlying listener fails, the
/// failure is yielded once and the watch goes quiet until `resubscribe`; the
/// tracker's memory survives, so peers already known to be available are not
/// announced again.
pub struct PresenceWatch {
    store: Arc<dyn PresenceStore>,
    tracker: PresenceTracker,
    subscription: Option<Subscription<PresenceSnapshot>>,
    pending: VecDeque<PresenceTransition>,
}

impl PresenceWatch {
    pub async fn observe(store: Arc<dyn PresenceStore>, exclude_id: &str) -> Result<Self> {
        let subscription = store.subscribe_users().await?;
        Ok(Self {
            store,
            tracker: PresenceTracker::new(exclude_id),
            subscription: Some(subscription),
            pending: VecDeque::new(),
        })
    }

    /// Next transition. `None` while detached (after a failure or a close).
    pub async fn next(&mut self) -> Option<Result<PresenceTransition>> {
        loop {
            if let Some(transition) = self.pending.pop_front() {
                return Some(Ok(transition));
            }

            let delivery = self.subscription.as_mut()?.next().await;
            match delivery {
                Some(Ok(snapshot)) => {
                    self.pending.extend(self.tracker.apply(&snapshot));
                }
                Some(Err(e)) => {
                    tracing::warn!("Presence listener failed: {}", e);
                    self.detach().await;
                    return Some(Err(e));
                }
                None => {
                    self.detach().await;
                    return None;
                }
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Attach a fresh listener, keeping what the tracker already knows.
    pub async fn resubscribe(&mut self) -> Result<()> {
        self.detach().await;
        self.subscription = Some(self.store.subscribe_users().await?);
        tracing::info!("Presence listener re-attached");
        Ok(())
    }

    pub async fn close(mut self) {
        self.detach().await;
    }

    async fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
    }
}
