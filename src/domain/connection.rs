//! Connection record and attribute upsert.

use std::collections::HashSet;

use serde::Serialize;

use super::ConnectionId;

/// Attributes a participant announces about itself via `user-info`.
///
/// A connection may announce this more than once (e.g. reconnect with richer
/// info); each application is a full upsert, last write wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub language_tags: Vec<String>,
    pub scene_hint: Option<String>,
    pub unlocked_scenes: HashSet<String>,
}

/// One live participant session with the matchmaking system.
///
/// Owned exclusively by the connection registry: created on first contact
/// with placeholder attributes, enriched in place when the participant
/// announces itself, destroyed when the transport closes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub name: String,
    pub language_tags: Vec<String>,
    pub scene_hint: Option<String>,
    pub unlocked_scenes: HashSet<String>,
    /// Best-effort geography tag, resolved asynchronously after registration.
    pub country: String,
    /// Unix timestamp (milliseconds, UTC) when the transport connected.
    pub connected_at: i64,
}

impl Connection {
    /// Create a record with placeholder attributes.
    ///
    /// The connection is usable for matchmaking immediately; geography stays
    /// "Unknown" until (and unless) the external lookup succeeds.
    pub fn anonymous(id: ConnectionId, connected_at: i64) -> Self {
        Self {
            id,
            name: "Anonymous".to_string(),
            language_tags: Vec::new(),
            scene_hint: None,
            unlocked_scenes: HashSet::new(),
            country: "Unknown".to_string(),
            connected_at,
        }
    }

    /// Replace the announced attributes with a newer profile.
    pub fn apply_profile(&mut self, profile: Profile) {
        self.name = profile.name;
        self.language_tags = profile.language_tags;
        self.scene_hint = profile.scene_hint;
        self.unlocked_scenes = profile.unlocked_scenes;
    }
}
