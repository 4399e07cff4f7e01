//! Matchmaking and signaling relay server implementation.

mod handler;
mod matchmaker;
mod registry;
mod runner;
mod signal;
mod state;

pub use handler::dispatch_event;
pub use matchmaker::{Matchmaker, RelayError, ROOM_GRACE_DELAY};
pub use registry::{ConnectionRegistry, RegistryError};
pub use runner::run_server;
pub use state::AppState;
