//! Presence store abstraction layer.
//!
//! This module defines the `PresenceStore` trait that abstracts the realtime
//! database holding the user collection, and the `Subscription` handle every
//! continuous listener is delivered through.

mod event_stream;
mod memory;
mod rest;
mod tree;

pub use memory::MemoryStore;
pub use rest::RestStore;

use std::future::Future;

use async_trait::async_trait;
use presence_common::{Coordinate, PresenceSnapshot, PresenceStatus, UserRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::Result;

/// Buffered deliveries per listener before the producer waits.
const SUBSCRIPTION_BUFFER: usize = 32;

/// Remote, subscribable collection of user records keyed by user id.
///
/// Subscriptions deliver the current value right away and then again on every
/// change. Collection subscriptions always carry the whole collection.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Backend name for logs (e.g., "memory", "rest").
    fn backend(&self) -> &'static str;

    /// One-shot read of a single user record.
    async fn read_user(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Create or replace a user record.
    async fn write_user(&self, user_id: &str, record: &UserRecord) -> Result<()>;

    /// Overwrite the status field of a user record.
    async fn write_status(&self, user_id: &str, status: PresenceStatus) -> Result<()>;

    /// Overwrite latitude and longitude of a user record together.
    async fn write_position(&self, user_id: &str, position: Coordinate) -> Result<()>;

    /// Listen to the whole user collection.
    async fn subscribe_users(&self) -> Result<Subscription<PresenceSnapshot>>;

    /// Listen to a single user record. `None` means the record does not exist.
    async fn subscribe_user(&self, user_id: &str) -> Result<Subscription<Option<UserRecord>>>;
}

/// Cancellable handle to a continuous listener.
///
/// Every opened subscription must be closed with [`Subscription::unsubscribe`].
/// A handle dropped while still attached is detached anyway and reported as a
/// leaked listener.
pub struct Subscription<T> {
    id: Uuid,
    label: String,
    rx: mpsc::Receiver<Result<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Spawn the producer of a new subscription.
    ///
    /// The producer gets the sending half of the delivery channel and should
    /// return once sending fails, which means the listener went away.
    pub fn spawn<F, Fut>(label: impl Into<String>, producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<T>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(producer(tx));
        let subscription = Self {
            id: Uuid::new_v4(),
            label: label.into(),
            rx,
            task: Some(task),
        };
        tracing::debug!(
            subscription = %subscription.id,
            "Listener attached to {}",
            subscription.label
        );
        subscription
    }
}

impl<T> Subscription<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Next delivery. `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }

    /// Detach the listener and wait until its producer is gone.
    pub async fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            tracing::debug!(subscription = %self.id, "Listener detached from {}", self.label);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::warn!(
                subscription = %self.id,
                "Leaked listener on {}: dropped without unsubscribe, detaching",
                self.label
            );
            task.abort();
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("attached", &self.task.is_some())
            .finish()
    }
}

/// Path of a user record inside the store.
pub fn user_path(user_id: &str) -> String {
    format!("{}/{}", presence_common::USERS_PATH, user_id)
}
