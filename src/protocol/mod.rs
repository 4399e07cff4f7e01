//! Wire contract between clients and the signaling relay.
//!
//! Every frame is a JSON object with a kebab-case `type` tag and camelCase
//! payload fields. Session descriptions and ICE candidates are opaque
//! [`serde_json::Value`]s: the relay forwards them untouched and never
//! interprets their contents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ConnectionId, Role, RoomId};

/// Inbound events, client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Announce attributes and (re-)enter the match queue.
    UserInfo {
        name: String,
        #[serde(default)]
        language_tags: Vec<String>,
        #[serde(default)]
        scene_hint: Option<String>,
        #[serde(default)]
        unlocked_scenes: Vec<String>,
    },
    /// Handshake leg 1, relayed verbatim to the peer.
    Offer {
        room_id: RoomId,
        session_description: Value,
    },
    /// Handshake leg 2, relayed verbatim to the peer.
    Answer {
        room_id: RoomId,
        session_description: Value,
    },
    /// Network-path candidate; the role tag identifies the negotiation leg.
    AddIceCandidate {
        room_id: RoomId,
        candidate: Value,
        role_tag: Role,
    },
    /// Signal intent to exchange roles with the peer.
    RequestSwap { room_id: RoomId },
    /// Intentional leave; the peer is torn down and requeued, the sender is
    /// expected to requeue itself via a fresh `user-info`.
    UserExit,
}

/// Outbound events, server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Live queue depth, pushed to every waiting connection.
    QueueCount { count: usize },
    /// Directed at exactly one participant of a fresh room: originate the
    /// offer. The other side learns of the room through the relayed offer.
    SendOffer {
        room_id: RoomId,
        role: Role,
        peer_name: String,
        peer_country: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        topic_id: Option<String>,
    },
    Offer {
        room_id: RoomId,
        session_description: Value,
    },
    Answer {
        room_id: RoomId,
        session_description: Value,
    },
    AddIceCandidate {
        room_id: RoomId,
        candidate: Value,
        role_tag: Role,
    },
    /// Both participants agreed to exchange roles.
    SwapRoles { room_id: RoomId },
    /// The peer left or disconnected; the client should reset its session
    /// state and wait out the grace delay before expecting a fresh match.
    RoomRemoved,
}

impl ServerEvent {
    /// Serialize for the WebSocket text channel.
    pub fn to_json(&self) -> String {
        // The enum contains only JSON-representable data; serialization
        // cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Connection identifier echo used by HTTP observability payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub name: String,
    pub country: String,
    pub connected_at: String,
}
