//! Presence: who is available, and who just became (un)available.

mod account;
mod roster;
mod tracker;

pub use account::{PositionPublisher, StatusChange, StatusController};
pub use roster::{filter_available, Roster, RosterEntry};
pub use tracker::{PresenceTracker, PresenceTransition, PresenceWatch, TransitionKind};
