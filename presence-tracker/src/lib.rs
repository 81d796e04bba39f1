//! Live presence and tracking core.
//!
//! Watches a shared collection of user records for availability changes,
//! derives the roster of trackable peers, and runs tracking sessions that keep
//! a target's marker, the distance to it, and the map viewport up to date.

pub mod error;
pub mod geo;
pub mod location;
pub mod presence;
pub mod session;
pub mod store;
pub mod viewport;

pub use error::{Error, Result};
pub use location::{FixedLocation, LocationSource, WatchLocation};
pub use presence::{
    PositionPublisher, PresenceTracker, PresenceTransition, PresenceWatch, Roster, RosterEntry,
    StatusController, TransitionKind,
};
pub use session::{
    SessionControl, SessionDriver, SessionEvent, SessionHandle, SessionPhase, TrackingSession,
};
pub use store::{MemoryStore, PresenceStore, RestStore, Subscription};
pub use viewport::Viewport;
