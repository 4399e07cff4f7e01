//! Matchmaking and signaling relay for anonymous 1:1 practice sessions.
//!
//! This library pairs connected participants two at a time, assigns the pair
//! a shared practice topic, and relays the WebRTC handshake messages (offer,
//! answer, ICE candidates) between the two browsers of a room without
//! interpreting them.

// layers
pub mod domain;
pub mod geo;
pub mod protocol;
pub mod server;

// shared library
pub mod common;
