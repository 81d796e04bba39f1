//! Device location sources.
//!
//! A `LocationSource` resolves one fix per request. Continuous updates are
//! built on top by polling the source from a subscription producer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use presence_common::Coordinate;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::store::Subscription;

/// Platform location service.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Resolve the current fix exactly once. `None` when no fix is available.
    async fn get_location(&self) -> Option<Coordinate>;
}

/// A source that always reports the same point (or never has a fix).
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(Option<Coordinate>);

impl FixedLocation {
    pub fn new(fix: Option<Coordinate>) -> Self {
        Self(fix)
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    async fn get_location(&self) -> Option<Coordinate> {
        self.0
    }
}

/// Latest fix pushed by the device shell.
#[derive(Debug)]
pub struct WatchLocation {
    tx: watch::Sender<Option<Coordinate>>,
}

impl WatchLocation {
    pub fn new(initial: Option<Coordinate>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn push(&self, fix: Coordinate) {
        self.tx.send_replace(Some(fix));
    }

    /// Forget the current fix, e.g. when the device lost its signal.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

#[async_trait]
impl LocationSource for WatchLocation {
    async fn get_location(&self) -> Option<Coordinate> {
        *self.tx.borrow()
    }
}

/// Continuous local-position updates.
///
/// Polls `source` every `every` and delivers the result whenever it differs
/// from the previous delivery. The first poll is always delivered, so an
/// initial `None` reaches the listener as "no fix available".
pub fn watch_fixes(
    source: Arc<dyn LocationSource>,
    every: Duration,
) -> Subscription<Option<Coordinate>> {
    Subscription::spawn("location", move |tx| async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<Option<Coordinate>> = None;

        loop {
            ticker.tick().await;
            let fix = source.get_location().await;
            if last == Some(fix) {
                continue;
            }
            last = Some(fix);
            if tx.send(Ok(fix)).await.is_err() {
                return;
            }
        }
    })
}
