//! In-process presence store.
//!
//! Keeps the user collection in memory with the same delivery semantics as the
//! realtime backend. Used by tests and by the agent's demo mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use presence_common::{Coordinate, PresenceSnapshot, PresenceStatus, UserRecord};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};

use super::{PresenceStore, Subscription};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum StoreSignal {
    Changed,
    Failed(String),
}

struct Inner {
    users: RwLock<BTreeMap<String, UserRecord>>,
    signals: broadcast::Sender<StoreSignal>,
    listeners: Arc<AtomicUsize>,
}

/// Counts a live listener for as long as its producer task exists.
struct ListenerGuard(Arc<AtomicUsize>);

impl ListenerGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Presence store backed by an ordered in-memory map.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_users(std::iter::empty())
    }

    /// Build a store pre-filled with the given records.
    pub fn with_users(users: impl IntoIterator<Item = (String, UserRecord)>) -> Self {
        let (signals, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                users: RwLock::new(users.into_iter().collect()),
                signals,
                listeners: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Remove a record entirely. Listeners see a snapshot without it.
    pub async fn remove_user(&self, user_id: &str) -> Option<UserRecord> {
        let removed = self.inner.users.write().await.remove(user_id);
        self.notify(StoreSignal::Changed);
        removed
    }

    /// Break every open listener with a connection error.
    pub fn fail_subscriptions(&self, message: impl Into<String>) {
        self.notify(StoreSignal::Failed(message.into()));
    }

    /// Number of listeners currently attached.
    pub fn active_listeners(&self) -> usize {
        self.inner.listeners.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> PresenceSnapshot {
        self.inner.snapshot().await
    }

    fn notify(&self, signal: StoreSignal) {
        // No receivers just means nobody is listening.
        let _ = self.inner.signals.send(signal);
    }

    async fn update<F>(&self, user_id: &str, mutate: F)
    where
        F: FnOnce(&mut UserRecord),
    {
        {
            let mut users = self.inner.users.write().await;
            let record = users.entry(user_id.to_string()).or_default();
            mutate(record);
        }
        self.notify(StoreSignal::Changed);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    async fn snapshot(&self) -> PresenceSnapshot {
        let users = self.users.read().await;
        PresenceSnapshot::new(
            users
                .iter()
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect(),
        )
    }

    async fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.read().await.get(user_id).cloned()
    }
}

#[async_trait]
impl PresenceStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.inner.user(user_id).await)
    }

    async fn write_user(&self, user_id: &str, record: &UserRecord) -> Result<()> {
        let record = record.clone();
        self.update(user_id, move |existing| *existing = record).await;
        Ok(())
    }

    async fn write_status(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        self.update(user_id, move |record| record.status = status).await;
        Ok(())
    }

    async fn write_position(&self, user_id: &str, position: Coordinate) -> Result<()> {
        self.update(user_id, move |record| record.set_coordinate(position))
            .await;
        Ok(())
    }

    async fn subscribe_users(&self) -> Result<Subscription<PresenceSnapshot>> {
        let inner = self.inner.clone();
        let mut signals = inner.signals.subscribe();
        let guard = ListenerGuard::new(inner.listeners.clone());

        Ok(Subscription::spawn("memory:users", move |tx| async move {
            let _guard = guard;
            if tx.send(Ok(inner.snapshot().await)).await.is_err() {
                return;
            }
            loop {
                match signals.recv().await {
                    Ok(StoreSignal::Changed) | Err(RecvError::Lagged(_)) => {
                        if tx.send(Ok(inner.snapshot().await)).await.is_err() {
                            return;
                        }
                    }
                    Ok(StoreSignal::Failed(message)) => {
                        let _ = tx.send(Err(Error::SubscriptionFailed(message))).await;
                        return;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }))
    }

    async fn subscribe_user(&self, user_id: &str) -> Result<Subscription<Option<UserRecord>>> {
        let inner = self.inner.clone();
        let mut signals = inner.signals.subscribe();
        let guard = ListenerGuard::new(inner.listeners.clone());
        let user_id = user_id.to_string();
        let label = format!("memory:users/{}", user_id);

        Ok(Subscription::spawn(label, move |tx| async move {
            let _guard = guard;
            let mut last = inner.user(&user_id).await;
            if tx.send(Ok(last.clone())).await.is_err() {
                return;
            }
            loop {
                match signals.recv().await {
                    Ok(StoreSignal::Changed) | Err(RecvError::Lagged(_)) => {
                        // Only changes to this record are delivered.
                        let current = inner.user(&user_id).await;
                        if current == last {
                            continue;
                        }
                        last = current.clone();
                        if tx.send(Ok(current)).await.is_err() {
                            return;
                        }
                    }
                    Ok(StoreSignal::Failed(message)) => {
                        let _ = tx.send(Err(Error::SubscriptionFailed(message))).await;
                        return;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }))
    }
}
