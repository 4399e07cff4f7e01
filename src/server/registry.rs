//! Connection registry: tracks every live connection and its attributes.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::common::time::now_millis;
use crate::domain::{Connection, ConnectionId, Profile};

/// Errors from registry push operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The target connection is not (or no longer) registered.
    #[error("connection '{0}' is not registered")]
    UnknownConnection(ConnectionId),

    /// The target's outbound channel is gone (transport mid-teardown).
    #[error("outbound channel for connection '{0}' is closed")]
    ChannelClosed(ConnectionId),
}

struct ConnectionEntry {
    info: Connection,
    /// Outbound channel to this connection's push task.
    sender: mpsc::UnboundedSender<String>,
}

/// Exclusive owner of all live connection records.
///
/// Queue and room membership are *not* tracked here; when a connection is
/// removed, the caller is responsible for cleaning those up first (the
/// registry does not cascade).
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Create a record with placeholder attributes and return a snapshot.
    ///
    /// The connection is immediately usable; geography stays "Unknown" until
    /// the external lookup writes it back via [`set_country`](Self::set_country).
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<String>,
    ) -> Connection {
        let info = Connection::anonymous(connection_id, now_millis());
        let mut connections = self.connections.lock().await;
        connections.insert(
            connection_id,
            ConnectionEntry {
                info: info.clone(),
                sender,
            },
        );
        tracing::debug!("Connection '{}' registered", connection_id);
        info
    }

    /// Idempotent attribute upsert; last write wins.
    ///
    /// Returns `false` when the connection is unknown (e.g. it disconnected
    /// while the frame was in flight).
    pub async fn update_attributes(&self, connection_id: ConnectionId, profile: Profile) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get_mut(&connection_id) {
            Some(entry) => {
                entry.info.apply_profile(profile);
                true
            }
            None => {
                tracing::warn!(
                    "Dropping attribute update for unknown connection '{}'",
                    connection_id
                );
                false
            }
        }
    }

    /// Write back the asynchronously resolved geography tag.
    pub async fn set_country(&self, connection_id: ConnectionId, country: String) {
        let mut connections = self.connections.lock().await;
        if let Some(entry) = connections.get_mut(&connection_id) {
            tracing::debug!("Connection '{}' resolved to '{}'", connection_id, country);
            entry.info.country = country;
        }
    }

    /// Purge the record. Returns `false` if it was already gone.
    pub async fn remove(&self, connection_id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        connections.remove(&connection_id).is_some()
    }

    /// Snapshot of a connection's attributes.
    pub async fn snapshot(&self, connection_id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.lock().await;
        connections.get(&connection_id).map(|e| e.info.clone())
    }

    /// Whether the connection is currently registered.
    pub async fn is_live(&self, connection_id: ConnectionId) -> bool {
        let connections = self.connections.lock().await;
        connections.contains_key(&connection_id)
    }

    /// Push one frame to a single connection.
    pub async fn push_to(
        &self,
        connection_id: ConnectionId,
        content: &str,
    ) -> Result<(), RegistryError> {
        let connections = self.connections.lock().await;
        let entry = connections
            .get(&connection_id)
            .ok_or(RegistryError::UnknownConnection(connection_id))?;
        entry
            .sender
            .send(content.to_string())
            .map_err(|_| RegistryError::ChannelClosed(connection_id))
    }

    /// Push one frame to many connections, tolerating individual failures.
    pub async fn push_to_each(&self, targets: &[ConnectionId], content: &str) {
        let connections = self.connections.lock().await;
        for target in targets {
            match connections.get(target) {
                Some(entry) => {
                    if entry.sender.send(content.to_string()).is_err() {
                        tracing::warn!("Failed to push to connection '{}'", target);
                    }
                }
                None => {
                    tracing::warn!("Connection '{}' not found during push, skipping", target);
                }
            }
        }
    }

    /// Number of live connections, for observability.
    pub async fn count(&self) -> usize {
        let connections = self.connections.lock().await;
        connections.len()
    }

    /// Snapshot of all live connections, sorted by connect time.
    pub async fn list(&self) -> Vec<Connection> {
        let connections = self.connections.lock().await;
        let mut all: Vec<Connection> = connections.values().map(|e| e.info.clone()).collect();
        all.sort_by_key(|c| c.connected_at);
        all
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
