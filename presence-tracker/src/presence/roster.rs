//! Available-peer roster.

use presence_common::{PresenceSnapshot, UserRecord};
use serde::Serialize;

/// A peer together with the id it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub id: String,
    pub record: UserRecord,
}

impl RosterEntry {
    pub fn display_name(&self) -> String {
        self.record.display_name()
    }
}

/// Available peers of `snapshot`, excluding `exclude_id`, in snapshot order.
pub fn filter_available(snapshot: &PresenceSnapshot, exclude_id: &str) -> Vec<RosterEntry> {
    snapshot
        .iter()
        .filter(|(id, record)| record.status.is_available() && *id != exclude_id)
        .map(|(id, record)| RosterEntry {
            id: id.to_string(),
            record: record.clone(),
        })
        .collect()
}

/// Current list of peers that can be tracked.
///
/// An empty roster that has been loaded ("nobody is available") is distinct
/// from one that has not received its first snapshot yet.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    loaded: bool,
}

impl Roster {
    /// Replace the roster with the available peers of `snapshot`.
    pub fn update(&mut self, snapshot: &PresenceSnapshot, exclude_id: &str) {
        self.entries = filter_available(snapshot, exclude_id);
        self.loaded = true;
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Resolve a selection back to its peer.
    pub fn find(&self, id: &str) -> Option<&RosterEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_common::PresenceStatus;

    fn record(name: &str, status: PresenceStatus) -> UserRecord {
        UserRecord {
            first_name: Some(name.to_string()),
            status,
            ..Default::default()
        }
    }

    fn sample() -> PresenceSnapshot {
        PresenceSnapshot::new(vec![
            ("me".to_string(), record("Me", PresenceStatus::Available)),
            ("p1".to_string(), record("Ana", PresenceStatus::Available)),
            ("p2".to_string(), record("Luis", PresenceStatus::Disconnected)),
            ("p3".to_string(), record("Eva", PresenceStatus::Available)),
        ])
    }

    #[test]
    fn test_filter_keeps_available_peers_in_order() {
        let peers = filter_available(&sample(), "me");
        let ids: Vec<&str> = peers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert!(peers.iter().all(|p| p.record.status.is_available()));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let snapshot = sample();
        assert_eq!(filter_available(&snapshot, "me"), filter_available(&snapshot, "me"));
    }

    #[test]
    fn test_identical_records_keep_their_own_ids() {
        let twin = record("Twin", PresenceStatus::Available);
        let snapshot = PresenceSnapshot::new(vec![
            ("t1".to_string(), twin.clone()),
            ("t2".to_string(), twin),
        ]);

        let mut roster = Roster::default();
        roster.update(&snapshot, "me");
        assert_eq!(roster.find("t2").map(|p| p.id.as_str()), Some("t2"));
        assert_eq!(roster.entries()[1].id, "t2");
    }

    #[test]
    fn test_loaded_flag_distinguishes_empty_from_pending() {
        let mut roster = Roster::default();
        assert!(!roster.is_loaded());
        assert!(roster.entries().is_empty());

        roster.update(&PresenceSnapshot::default(), "me");
        assert!(roster.is_loaded());
        assert!(roster.entries().is_empty());
    }
}
