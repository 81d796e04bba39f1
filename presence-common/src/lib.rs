//! Presence Common Types
//!
//! Shared types used by both the presence-tracker core and the presence-agent host.

pub mod record;
pub mod snapshot;
pub mod status;

pub use record::{Coordinate, UserRecord};
pub use snapshot::PresenceSnapshot;
pub use status::PresenceStatus;

/// Root of the user collection in the realtime store.
pub const USERS_PATH: &str = "users";
