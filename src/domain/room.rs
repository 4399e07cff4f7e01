//! Room entity: one active pairing, its roles and swap negotiation.

use serde::{Deserialize, Serialize};

use super::{ConnectionId, RoomId};

/// Role tag of a participant within a room.
///
/// Assigned deterministically at room creation (first popped candidate is
/// `A`) and independent of which side originates the handshake. The tag is
/// carried on ICE candidate relays so the receiver can associate a candidate
/// with the correct negotiation leg; each side runs its own sender/receiver
/// handshake and candidates must not be cross-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    A,
    B,
}

impl Role {
    /// The other role of the pair.
    pub fn other(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Role::A => 0,
            Role::B => 1,
        }
    }
}

/// Lifecycle state of a room.
///
/// A torn-down room is marked `Closed` but kept in the room table for the
/// grace window so stale relay messages referencing it are recognized and
/// dropped instead of being mistaken for unknown rooms; physical removal
/// happens afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Open,
    Closed,
}

/// One active (or recently closed) pairing between two connections.
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: RoomId,
    /// Participants indexed by role: `[role A, role B]`.
    participants: [ConnectionId; 2],
    /// Shared practice topic, `None` when both unlocked sets were empty.
    pub topic_id: Option<String>,
    state: RoomState,
    /// Per-role swap intent; both set means the roles exchange.
    swap_intent: [bool; 2],
}

impl Room {
    pub fn new(id: RoomId, role_a: ConnectionId, role_b: ConnectionId, topic_id: Option<String>) -> Self {
        Self {
            id,
            participants: [role_a, role_b],
            topic_id,
            state: RoomState::Open,
            swap_intent: [false, false],
        }
    }

    /// Role of the given participant, `None` for non-members.
    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Role> {
        if self.participants[0] == connection_id {
            Some(Role::A)
        } else if self.participants[1] == connection_id {
            Some(Role::B)
        } else {
            None
        }
    }

    /// The other participant of the room, `None` for non-members.
    pub fn peer_of(&self, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.role_of(connection_id)
            .map(|role| self.participants[role.other().index()])
    }

    pub fn participant(&self, role: Role) -> ConnectionId {
        self.participants[role.index()]
    }

    /// Record swap intent for one role.
    ///
    /// Returns `true` when this intent completes the negotiation: both flags
    /// were set, the roles are exchanged and both flags reset. One-sided
    /// intent persists until agreement or teardown; there is no timeout.
    pub fn request_swap(&mut self, role: Role) -> bool {
        self.swap_intent[role.index()] = true;
        if self.swap_intent == [true, true] {
            self.participants.swap(0, 1);
            self.swap_intent = [false, false];
            true
        } else {
            false
        }
    }

    /// Mark the room torn down. Idempotent.
    pub fn close(&mut self) {
        self.state = RoomState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == RoomState::Closed
    }
}
