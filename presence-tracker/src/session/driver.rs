//! Runs a tracking session against a store and a location source.

use std::sync::Arc;
use std::time::Duration;

use presence_common::{Coordinate, UserRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{SessionEvent, TrackingSession};
use crate::error::Result;
use crate::location::{watch_fixes, LocationSource};
use crate::store::{PresenceStore, Subscription};

/// Buffered display events per session before the driver waits on the reader.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Control {
    Suspend,
    Resume,
    Close,
}

/// Opens tracking sessions.
#[derive(Clone)]
pub struct SessionDriver {
    store: Arc<dyn PresenceStore>,
    location: Arc<dyn LocationSource>,
    location_interval: Duration,
    fallback_center: Coordinate,
}

impl SessionDriver {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        location: Arc<dyn LocationSource>,
        location_interval: Duration,
        fallback_center: Coordinate,
    ) -> Self {
        Self {
            store,
            location,
            location_interval,
            fallback_center,
        }
    }

    /// Start tracking `target_id`.
    ///
    /// Fails with `InvalidTarget` or `TargetNotFound` (or a store error from
    /// the initial read) before anything is spawned. Otherwise the returned
    /// handle yields display events until it is closed or dropped.
    pub async fn open(&self, target_id: &str, target_name: &str) -> Result<SessionHandle> {
        let mut session = TrackingSession::new(target_id, target_name, self.fallback_center);
        let mut initial = session.begin()?;

        let record = self.store.read_user(target_id).await?;
        initial.extend(session.on_target_loaded(record)?);

        // Listen even when the target has no position yet, so one showing up is seen.
        let target_updates = match self.store.subscribe_user(target_id).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                initial.extend(session.on_target_failed(e));
                None
            }
        };
        let fixes = watch_fixes(self.location.clone(), self.location_interval);

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (control_tx, control_rx) = mpsc::channel(8);

        tracing::info!(
            "Tracking session opened for {} ({})",
            session.target_name(),
            session.target_id()
        );

        let task = tokio::spawn(run_session(
            session,
            initial,
            target_updates,
            fixes,
            events_tx,
            control_rx,
        ));

        Ok(SessionHandle {
            events: events_rx,
            control: control_tx,
            task: Some(task),
        })
    }
}

/// Owner-side handle of a running session.
///
/// Dropping the handle (or just its event receiver) closes the session.
pub struct SessionHandle {
    events: mpsc::Receiver<SessionEvent>,
    control: mpsc::Sender<Control>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Next display event. `None` once the session is closed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub async fn suspend(&self) {
        let _ = self.control.send(Control::Suspend).await;
    }

    pub async fn resume(&self) {
        let _ = self.control.send(Control::Resume).await;
    }

    /// Close the session and wait until its listeners are detached.
    pub async fn close(mut self) {
        let _ = self.control.send(Control::Close).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Separate control from the event receiver.
    ///
    /// Used by streaming responses: the session closes when the receiver is
    /// dropped, while the [`SessionControl`] can still suspend and resume it
    /// from elsewhere.
    pub fn split(self) -> (SessionControl, mpsc::Receiver<SessionEvent>) {
        let control = SessionControl {
            control: self.control,
        };
        (control, self.events)
    }
}

/// Cloneable suspend/resume access to a running session.
#[derive(Debug, Clone)]
pub struct SessionControl {
    control: mpsc::Sender<Control>,
}

impl SessionControl {
    /// Returns false when the session is already closed.
    pub async fn suspend(&self) -> bool {
        self.control.send(Control::Suspend).await.is_ok()
    }

    /// Returns false when the session is already closed.
    pub async fn resume(&self) -> bool {
        self.control.send(Control::Resume).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

async fn next_command(control: &mut Option<mpsc::Receiver<Control>>) -> Option<Control> {
    match control {
        Some(control) => control.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_delivery<T>(subscription: &mut Option<Subscription<T>>) -> Option<Result<T>> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

async fn detach<T>(subscription: &mut Option<Subscription<T>>) {
    if let Some(subscription) = subscription.take() {
        subscription.unsubscribe().await;
    }
}

async fn run_session(
    mut session: TrackingSession,
    initial: Vec<SessionEvent>,
    target_updates: Option<Subscription<Option<UserRecord>>>,
    fixes: Subscription<Option<Coordinate>>,
    events: mpsc::Sender<SessionEvent>,
    control: mpsc::Receiver<Control>,
) {
    let mut control = Some(control);
    let mut target_updates = target_updates;
    let mut fixes = Some(fixes);
    let mut pending = initial;

    'session: loop {
        for event in pending.drain(..) {
            tracing::debug!(target_id = %session.target_id(), ?event, "Session event");
            if events.send(event).await.is_err() {
                break 'session;
            }
        }

        pending = tokio::select! {
            command = next_command(&mut control) => match command {
                Some(Control::Suspend) => session.suspend(),
                Some(Control::Resume) => session.resume(),
                Some(Control::Close) => break 'session,
                // Every controller is gone; the event receiver decides the lifetime.
                None => {
                    control = None;
                    Vec::new()
                }
            },
            delivery = next_delivery(&mut target_updates) => match delivery {
                Some(Ok(record)) => session.on_target_update(record),
                Some(Err(e)) => {
                    detach(&mut target_updates).await;
                    session.on_target_failed(e)
                }
                None => {
                    detach(&mut target_updates).await;
                    Vec::new()
                }
            },
            delivery = next_delivery(&mut fixes) => match delivery {
                Some(Ok(fix)) => session.on_local_fix(fix),
                Some(Err(e)) => {
                    tracing::warn!("Location feed failed: {}", e);
                    detach(&mut fixes).await;
                    session.on_local_fix(None)
                }
                None => {
                    detach(&mut fixes).await;
                    Vec::new()
                }
            },
            _ = events.closed() => break 'session,
        };
    }

    for event in session.close() {
        let _ = events.try_send(event);
    }
    detach(&mut target_updates).await;
    detach(&mut fixes).await;
    tracing::info!("Tracking session for {} closed", session.target_id());
}
