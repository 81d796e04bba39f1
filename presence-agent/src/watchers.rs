//! Background listeners that keep the agent's view of the collection current.
//!
//! Each watcher owns its own listener and re-attaches after the configured
//! delay when the store drops it.

use std::sync::Arc;

use presence_tracker::location::watch_fixes;
use presence_tracker::{PositionPublisher, PresenceWatch};

use crate::state::{AppState, Notice};

/// Spawn every background watcher.
pub fn spawn_all(state: Arc<AppState>) {
    tokio::spawn(watch_presence(state.clone()));
    tokio::spawn(watch_roster(state.clone()));

    if state.config.location.publish {
        let publisher = PositionPublisher::new(state.store.clone(), state.self_id());
        let fixes = watch_fixes(state.location.clone(), state.config.location_interval());
        tokio::spawn(publisher.run(fixes));
        tracing::info!("Publishing own position for {}", state.self_id());
    }
}

/// Turn availability changes of peers into notices.
pub async fn watch_presence(state: Arc<AppState>) {
    let mut watch = loop {
        match PresenceWatch::observe(state.store.clone(), state.self_id()).await {
            Ok(watch) => break watch,
            Err(e) => {
                tracing::error!("Failed to attach presence listener: {}", e);
                tokio::time::sleep(state.config.resubscribe_delay()).await;
            }
        }
    };
    tracing::info!("Presence listener attached");

    loop {
        while let Some(delivery) = watch.next().await {
            match delivery {
                Ok(transition) => {
                    tracing::info!("{}", transition.notice());
                    state.notify(Notice::from(&transition));
                }
                Err(e) => {
                    state.notify(Notice::new(e.kind(), e.user_message()));
                }
            }
        }

        tracing::info!(
            "Re-attaching presence listener in {} seconds...",
            state.config.store.resubscribe_delay_secs
        );
        tokio::time::sleep(state.config.resubscribe_delay()).await;
        if let Err(e) = watch.resubscribe().await {
            tracing::error!("Failed to re-attach presence listener: {}", e);
        }
    }
}

/// Keep the roster of available peers in step with the collection.
pub async fn watch_roster(state: Arc<AppState>) {
    loop {
        match state.store.subscribe_users().await {
            Ok(mut subscription) => {
                while let Some(delivery) = subscription.next().await {
                    match delivery {
                        Ok(snapshot) => {
                            let mut roster = state.roster.write().await;
                            roster.update(&snapshot, state.self_id());
                            tracing::debug!("Roster now has {} peers", roster.entries().len());
                        }
                        Err(e) => {
                            tracing::warn!("Roster listener failed: {}", e);
                            break;
                        }
                    }
                }
                subscription.unsubscribe().await;
            }
            Err(e) => {
                tracing::error!("Failed to attach roster listener: {}", e);
            }
        }

        tokio::time::sleep(state.config.resubscribe_delay()).await;
    }
}
