//! Live tracking sessions.
//!
//! A session follows one target user: it loads the target's position, keeps a
//! single marker in sync with it, and recomputes distance and viewport as the
//! target and the local device move.
//!
//! # States
//!
//! ```text
//! Initializing -> WaitingForTarget -> Active <-> Suspended
//!       |                |              |          |
//!       +----------------+--------------+----------+--> Closed
//! ```
//!
//! [`TrackingSession`] is the pure state machine: every input returns the
//! [`SessionEvent`]s the display should apply, in order. [`SessionDriver`]
//! wires it to a store and a location source.

mod driver;

pub use driver::{SessionControl, SessionDriver, SessionHandle};

use presence_common::{Coordinate, UserRecord};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geo::{distance_meters, format_distance};
use crate::viewport::{self, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    WaitingForTarget,
    Active,
    Suspended,
    Closed,
}

/// Display instructions produced by a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged { phase: SessionPhase },
    /// The target marker appears for the first time.
    TargetMarkerPlaced { position: Coordinate, title: String },
    TargetMarkerMoved { position: Coordinate },
    LocalMarkerMoved { position: Coordinate },
    DistanceChanged { meters: f64, text: String },
    ViewportChanged { viewport: Viewport },
    Notice { kind: &'static str, message: String },
}

impl SessionEvent {
    fn notice(error: &Error) -> Self {
        SessionEvent::Notice {
            kind: error.kind(),
            message: error.user_message(),
        }
    }

    /// Whether the event only affects what is drawn (withheld while suspended).
    fn is_view(&self) -> bool {
        !matches!(
            self,
            SessionEvent::PhaseChanged { .. } | SessionEvent::Notice { .. }
        )
    }
}

/// Tracking state for one target.
#[derive(Debug)]
pub struct TrackingSession {
    target_id: String,
    target_name: String,
    fallback_center: Coordinate,
    phase: SessionPhase,
    target: Option<Coordinate>,
    local: Option<Coordinate>,
    /// True until the target marker has been placed once.
    first_update: bool,
    /// Whether the display has received the target marker's placement.
    marker_shown: bool,
    location_notice_sent: bool,
    distance: Option<f64>,
    viewport: Option<Viewport>,
}

impl TrackingSession {
    pub fn new(
        target_id: impl Into<String>,
        target_name: impl Into<String>,
        fallback_center: Coordinate,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            target_name: target_name.into(),
            fallback_center,
            phase: SessionPhase::Initializing,
            target: None,
            local: None,
            first_update: true,
            marker_shown: false,
            location_notice_sent: false,
            distance: None,
            viewport: None,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn target(&self) -> Option<Coordinate> {
        self.target
    }

    pub fn local(&self) -> Option<Coordinate> {
        self.local
    }

    /// Last computed distance in meters.
    pub fn distance(&self) -> Option<f64> {
        self.distance
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Validate the target id and start waiting for the target's record.
    pub fn begin(&mut self) -> Result<Vec<SessionEvent>> {
        if self.phase != SessionPhase::Initializing {
            return Ok(Vec::new());
        }
        if self.target_id.trim().is_empty() {
            self.phase = SessionPhase::Closed;
            return Err(Error::InvalidTarget(self.target_id.clone()));
        }
        let mut events = Vec::new();
        self.set_phase(SessionPhase::WaitingForTarget, &mut events);
        Ok(events)
    }

    /// Apply the one-shot read of the target's record.
    ///
    /// A missing record closes the session. A record without a position still
    /// activates it, showing the fallback viewport until a position arrives.
    pub fn on_target_loaded(&mut self, record: Option<UserRecord>) -> Result<Vec<SessionEvent>> {
        if self.phase != SessionPhase::WaitingForTarget {
            return Ok(Vec::new());
        }
        let Some(record) = record else {
            self.phase = SessionPhase::Closed;
            return Err(Error::TargetNotFound(self.target_id.clone()));
        };

        if self.target_name.trim().is_empty() {
            self.target_name = record.display_name();
        }

        let mut events = Vec::new();
        self.set_phase(SessionPhase::Active, &mut events);

        match record.coordinate() {
            Some(position) => self.apply_target(position, &mut events),
            None => {
                events.push(SessionEvent::Notice {
                    kind: "target_without_position",
                    message: "El usuario no tiene coordenadas de ubicación registradas"
                        .to_string(),
                });
                self.show(viewport::fallback(self.fallback_center), &mut events);
            }
        }

        Ok(self.release(events))
    }

    /// Apply a live update of the target's record. Updates without a position are ignored.
    pub fn on_target_update(&mut self, record: Option<UserRecord>) -> Vec<SessionEvent> {
        if !self.is_tracking() {
            return Vec::new();
        }
        let Some(position) = record.as_ref().and_then(UserRecord::coordinate) else {
            tracing::debug!("Ignoring update of {} without a position", self.target_id);
            return Vec::new();
        };
        if self.target == Some(position) && !self.first_update {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.apply_target(position, &mut events);
        self.release(events)
    }

    /// The target listener broke. The session keeps its last known data.
    pub fn on_target_failed(&mut self, error: Error) -> Vec<SessionEvent> {
        if self.is_closed() {
            return Vec::new();
        }
        tracing::warn!("Tracking of {} lost its listener: {}", self.target_id, error);
        vec![SessionEvent::notice(&error)]
    }

    /// Apply a local location result. `None` means no fix could be obtained.
    ///
    /// Local fixes are accepted in any open phase, since they may arrive
    /// before the target's record does.
    pub fn on_local_fix(&mut self, fix: Option<Coordinate>) -> Vec<SessionEvent> {
        if self.is_closed() {
            return Vec::new();
        }

        let Some(fix) = fix else {
            if self.location_notice_sent {
                return Vec::new();
            }
            self.location_notice_sent = true;
            return vec![SessionEvent::notice(&Error::LocationUnavailable)];
        };
        if self.local == Some(fix) {
            return Vec::new();
        }

        self.local = Some(fix);
        let mut events = vec![SessionEvent::LocalMarkerMoved { position: fix }];

        if self.is_tracking() {
            match self.target {
                Some(target) => {
                    self.update_distance(fix, target, &mut events);
                    self.show(viewport::plan(fix, target), &mut events);
                }
                None => self.show(viewport::plan_single(fix), &mut events),
            }
        }

        self.release(events)
    }

    /// Stop emitting view updates; inputs are still applied.
    pub fn suspend(&mut self) -> Vec<SessionEvent> {
        if self.phase != SessionPhase::Active {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.set_phase(SessionPhase::Suspended, &mut events);
        events
    }

    /// Resume view updates and re-emit the current view.
    pub fn resume(&mut self) -> Vec<SessionEvent> {
        if self.phase != SessionPhase::Suspended {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.set_phase(SessionPhase::Active, &mut events);

        if let Some(position) = self.target.filter(|_| !self.first_update) {
            if self.marker_shown {
                events.push(SessionEvent::TargetMarkerMoved { position });
            } else {
                // First placement happened while suspended.
                self.marker_shown = true;
                events.push(SessionEvent::TargetMarkerPlaced {
                    position,
                    title: self.target_name.clone(),
                });
            }
        }
        if let Some(position) = self.local {
            events.push(SessionEvent::LocalMarkerMoved { position });
        }
        if let Some(meters) = self.distance {
            events.push(SessionEvent::DistanceChanged {
                meters,
                text: format_distance(meters),
            });
        }
        if let Some(viewport) = self.viewport {
            events.push(SessionEvent::ViewportChanged { viewport });
        }
        events
    }

    pub fn close(&mut self) -> Vec<SessionEvent> {
        if self.is_closed() {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.set_phase(SessionPhase::Closed, &mut events);
        events
    }

    fn is_tracking(&self) -> bool {
        matches!(self.phase, SessionPhase::Active | SessionPhase::Suspended)
    }

    fn set_phase(&mut self, phase: SessionPhase, events: &mut Vec<SessionEvent>) {
        if self.phase != phase {
            self.phase = phase;
            events.push(SessionEvent::PhaseChanged { phase });
        }
    }

    fn show(&mut self, viewport: Viewport, events: &mut Vec<SessionEvent>) {
        self.viewport = Some(viewport);
        events.push(SessionEvent::ViewportChanged { viewport });
    }

    fn update_distance(&mut self, local: Coordinate, target: Coordinate, events: &mut Vec<SessionEvent>) {
        let meters = distance_meters(local, target);
        self.distance = Some(meters);
        events.push(SessionEvent::DistanceChanged {
            meters,
            text: format_distance(meters),
        });
    }

    /// Move the target, its marker, and everything derived from it.
    fn apply_target(&mut self, position: Coordinate, events: &mut Vec<SessionEvent>) {
        self.target = Some(position);

        if self.first_update {
            // First placement recenters on the target once.
            self.first_update = false;
            self.marker_shown = self.phase != SessionPhase::Suspended;
            events.push(SessionEvent::TargetMarkerPlaced {
                position,
                title: self.target_name.clone(),
            });
            self.show(viewport::plan_single(position), events);
        } else {
            events.push(SessionEvent::TargetMarkerMoved { position });
        }

        if let Some(local) = self.local {
            self.update_distance(local, position, events);
            self.show(viewport::plan(local, position), events);
        }
    }

    /// Drop view events while suspended.
    fn release(&self, mut events: Vec<SessionEvent>) -> Vec<SessionEvent> {
        if self.phase == SessionPhase::Suspended {
            events.retain(|event| !event.is_view());
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_common::PresenceStatus;
    use crate::viewport::DEFAULT_FALLBACK_CENTER;

    const LOCAL: Coordinate = Coordinate {
        latitude: 4.65,
        longitude: -74.08,
    };
    const TARGET: Coordinate = Coordinate {
        latitude: 4.66,
        longitude: -74.09,
    };

    fn record_at(position: Option<Coordinate>) -> UserRecord {
        let mut record = UserRecord {
            first_name: Some("Ana".to_string()),
            last_name: Some("Ruiz".to_string()),
            status: PresenceStatus::Available,
            ..Default::default()
        };
        if let Some(position) = position {
            record.set_coordinate(position);
        }
        record
    }

    fn active_session(target: Option<Coordinate>) -> TrackingSession {
        let mut session = TrackingSession::new("target", "Ana Ruiz", DEFAULT_FALLBACK_CENTER);
        session.begin().unwrap();
        session.on_target_loaded(Some(record_at(target))).unwrap();
        session
    }

    fn viewports(events: &[SessionEvent]) -> Vec<Viewport> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ViewportChanged { viewport } => Some(*viewport),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_target_is_invalid() {
        let mut session = TrackingSession::new("  ", "Nobody", DEFAULT_FALLBACK_CENTER);
        assert!(matches!(session.begin(), Err(Error::InvalidTarget(_))));
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(session.on_local_fix(Some(LOCAL)).is_empty());
    }

    #[test]
    fn test_missing_target_closes_session() {
        let mut session = TrackingSession::new("ghost", "Ghost", DEFAULT_FALLBACK_CENTER);
        assert_eq!(
            session.begin().unwrap(),
            vec![SessionEvent::PhaseChanged {
                phase: SessionPhase::WaitingForTarget
            }]
        );
        assert_eq!(session.phase(), SessionPhase::WaitingForTarget);
        assert!(session.begin().unwrap().is_empty());

        let err = session.on_target_loaded(None).unwrap_err();
        assert_eq!(err, Error::TargetNotFound("ghost".to_string()));
        assert!(session.is_closed());
    }

    #[test]
    fn test_target_without_position_shows_fallback() {
        let mut session = TrackingSession::new("target", "Ana", DEFAULT_FALLBACK_CENTER);
        session.begin().unwrap();
        let events = session.on_target_loaded(Some(record_at(None))).unwrap();

        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.distance(), None);
        assert_eq!(
            viewports(&events),
            vec![Viewport {
                center: DEFAULT_FALLBACK_CENTER,
                zoom: 10
            }]
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice { kind: "target_without_position", .. })));

        // Updates without a position are ignored; the first real one places the marker.
        assert!(session.on_target_update(Some(record_at(None))).is_empty());
        let events = session.on_target_update(Some(record_at(Some(TARGET))));
        assert!(matches!(events[0], SessionEvent::TargetMarkerPlaced { .. }));
        assert_eq!(session.target(), Some(TARGET));
    }

    #[test]
    fn test_first_load_places_marker_and_recenters() {
        let mut session = TrackingSession::new("target", "Ana Ruiz", DEFAULT_FALLBACK_CENTER);
        session.begin().unwrap();
        let events = session.on_target_loaded(Some(record_at(Some(TARGET)))).unwrap();

        assert_eq!(
            events,
            vec![
                SessionEvent::PhaseChanged {
                    phase: SessionPhase::Active
                },
                SessionEvent::TargetMarkerPlaced {
                    position: TARGET,
                    title: "Ana Ruiz".to_string()
                },
                SessionEvent::ViewportChanged {
                    viewport: viewport::plan_single(TARGET)
                },
            ]
        );
    }

    #[test]
    fn test_target_moves_without_recentering_when_local_unknown() {
        let mut session = active_session(Some(TARGET));
        let moved = Coordinate::new(4.67, -74.10);
        let events = session.on_target_update(Some(record_at(Some(moved))));

        assert_eq!(events, vec![SessionEvent::TargetMarkerMoved { position: moved }]);
        assert_eq!(session.viewport(), Some(viewport::plan_single(TARGET)));
    }

    #[test]
    fn test_local_fix_computes_distance_and_two_point_view() {
        let mut session = active_session(Some(TARGET));
        let events = session.on_local_fix(Some(LOCAL));

        let meters = session.distance().unwrap();
        assert!((1560.0..1580.0).contains(&meters));
        assert!(events.contains(&SessionEvent::DistanceChanged {
            meters,
            text: "1.57 km".to_string()
        }));
        assert_eq!(viewports(&events), vec![viewport::plan(LOCAL, TARGET)]);
        assert_eq!(session.viewport().unwrap().zoom, 13);
    }

    #[test]
    fn test_local_fix_before_target_is_kept() {
        let mut session = TrackingSession::new("target", "Ana", DEFAULT_FALLBACK_CENTER);
        session.begin().unwrap();

        let events = session.on_local_fix(Some(LOCAL));
        assert_eq!(events, vec![SessionEvent::LocalMarkerMoved { position: LOCAL }]);
        assert!(session.distance().is_none());

        let events = session.on_target_loaded(Some(record_at(Some(TARGET)))).unwrap();
        assert!(session.distance().is_some());
        // Recentred on the target first, then fitted to both points.
        assert_eq!(
            viewports(&events),
            vec![viewport::plan_single(TARGET), viewport::plan(LOCAL, TARGET)]
        );
    }

    #[test]
    fn test_local_only_view_when_target_has_no_position() {
        let mut session = active_session(None);
        let events = session.on_local_fix(Some(LOCAL));
        assert_eq!(viewports(&events), vec![viewport::plan_single(LOCAL)]);
        assert!(session.distance().is_none());
    }

    #[test]
    fn test_location_failure_noticed_once() {
        let mut session = active_session(Some(TARGET));
        let first = session.on_local_fix(None);
        assert_eq!(first.len(), 1);
        assert!(matches!(
            first[0],
            SessionEvent::Notice {
                kind: "location_unavailable",
                ..
            }
        ));
        assert!(session.on_local_fix(None).is_empty());
        assert!(session.local().is_none());
    }

    #[test]
    fn test_target_failure_keeps_session_active() {
        let mut session = active_session(Some(TARGET));
        let events = session.on_target_failed(Error::SubscriptionFailed("reset".to_string()));
        assert_eq!(events.len(), 1);
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.target(), Some(TARGET));
    }

    #[test]
    fn test_suspend_withholds_view_until_resume() {
        let mut session = active_session(Some(TARGET));
        session.suspend();
        assert_eq!(session.phase(), SessionPhase::Suspended);

        assert!(session.on_local_fix(Some(LOCAL)).is_empty());
        assert!(session.distance().is_some());

        let events = session.resume();
        assert_eq!(
            events[0],
            SessionEvent::PhaseChanged {
                phase: SessionPhase::Active
            }
        );
        assert!(events.contains(&SessionEvent::TargetMarkerMoved { position: TARGET }));
        assert!(events.contains(&SessionEvent::LocalMarkerMoved { position: LOCAL }));
        assert_eq!(viewports(&events), vec![viewport::plan(LOCAL, TARGET)]);
    }

    #[test]
    fn test_target_first_placed_while_suspended_is_placed_on_resume() {
        let mut session = active_session(None);
        session.suspend();

        assert!(session
            .on_target_update(Some(record_at(Some(TARGET))))
            .is_empty());

        let events = session.resume();
        assert!(events.contains(&SessionEvent::TargetMarkerPlaced {
            position: TARGET,
            title: "Ana Ruiz".to_string()
        }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::TargetMarkerMoved { .. })));
        assert_eq!(viewports(&events), vec![viewport::plan_single(TARGET)]);

        // From then on the marker only moves.
        let events = session.on_target_update(Some(record_at(Some(LOCAL))));
        assert_eq!(events[0], SessionEvent::TargetMarkerMoved { position: LOCAL });
    }

    #[test]
    fn test_closed_session_ignores_input() {
        let mut session = active_session(Some(TARGET));
        assert_eq!(
            session.close(),
            vec![SessionEvent::PhaseChanged {
                phase: SessionPhase::Closed
            }]
        );
        assert!(session.on_local_fix(Some(LOCAL)).is_empty());
        assert!(session
            .on_target_update(Some(record_at(Some(LOCAL))))
            .is_empty());
        assert!(session.close().is_empty());
    }

    #[test]
    fn test_events_serialize_tagged() {
        let json = serde_json::to_value(SessionEvent::PhaseChanged {
            phase: SessionPhase::WaitingForTarget,
        })
        .unwrap();
        assert_eq!(json["type"], "phase_changed");
        assert_eq!(json["phase"], "waiting_for_target");
    }
}
