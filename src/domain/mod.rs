//! Domain model for the matchmaking and signaling relay.

mod connection;
mod ids;
mod room;
mod theme;

pub use connection::{Connection, Profile};
pub use ids::{ConnectionId, RoomId};
pub use room::{Role, Room, RoomState};
pub use theme::select_theme;
