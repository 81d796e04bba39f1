//! Point-in-time copies of the user collection.

use serde_json::Value;

use crate::UserRecord;

/// The whole user collection at one instant, in the store's child order.
///
/// Snapshots are delivered wholesale on every change, never as deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceSnapshot {
    entries: Vec<(String, UserRecord)>,
}

impl PresenceSnapshot {
    pub fn new(entries: Vec<(String, UserRecord)>) -> Self {
        Self { entries }
    }

    /// Decode a collection node (`{ "<id>": { ...record } }`).
    ///
    /// Children that do not decode as a record are skipped. `null` or any
    /// non-object node is an empty collection.
    pub fn from_json(value: &Value) -> Self {
        let Some(children) = value.as_object() else {
            return Self::default();
        };

        let entries = children
            .iter()
            .filter_map(|(id, child)| {
                serde_json::from_value::<UserRecord>(child.clone())
                    .ok()
                    .map(|record| (id.clone(), record))
            })
            .collect();

        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UserRecord)> {
        self.entries.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn get(&self, id: &str) -> Option<&UserRecord> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
