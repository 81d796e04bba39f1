//! Presence status of a user.

use serde::{Deserialize, Serialize};

/// Whether a user can currently be found and tracked by peers.
///
/// Only `available` users show up in rosters. Anything the store holds that is
/// not exactly `"available"` (missing, null, or an unknown string) decodes as
/// `Disconnected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum PresenceStatus {
    /// Visible to peers and trackable.
    Available,
    /// Hidden from peers.
    #[default]
    Disconnected,
}

impl PresenceStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, PresenceStatus::Available)
    }

    /// The opposite status, used by the status toggle.
    pub fn toggled(&self) -> Self {
        match self {
            PresenceStatus::Available => PresenceStatus::Disconnected,
            PresenceStatus::Disconnected => PresenceStatus::Available,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Available => "available",
            PresenceStatus::Disconnected => "disconnected",
        }
    }
}

impl From<Option<String>> for PresenceStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("available") => PresenceStatus::Available,
            _ => PresenceStatus::Disconnected,
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
