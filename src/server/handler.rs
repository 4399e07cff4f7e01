//! WebSocket connection handlers and HTTP observability endpoints.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::common::time::timestamp_to_rfc3339;
use crate::domain::{ConnectionId, Profile};
use crate::geo::CountryResolver;
use crate::protocol::{ClientEvent, ConnectionSummary};

use super::registry::ConnectionRegistry;
use super::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    // One id per transport session; participants are anonymous.
    let connection_id = ConnectionId::generate();

    // Channel for server-initiated pushes to this client
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(connection_id, tx).await;
    tracing::info!(
        "Connection '{}' established from {}",
        connection_id,
        addr.ip()
    );

    // Geography enrichment runs detached; the connection is usable
    // immediately with the "Unknown" placeholder.
    if let Some(resolver) = state.geo.clone() {
        spawn_country_lookup(state.registry.clone(), resolver, connection_id, addr.ip());
    }

    let (mut sender, mut receiver) = socket.split();

    // Task pushing queued frames out to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Task draining inbound frames from this client
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on connection '{}': {}", connection_id, e);
                    break;
                }
            };
            match msg {
                Message::Text(text) => {
                    dispatch_event(&recv_state, connection_id, &text).await;
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If either task completes, the transport is done; abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Hard disconnect: queue and room membership must be cleaned up before
    // the registry record is purged, so no dangling id survives.
    state.matchmaker.exit_ungraceful(connection_id).await;
    state.registry.remove(connection_id).await;
    tracing::info!("Connection '{}' closed and purged", connection_id);
}

/// Parse and apply one inbound client frame.
///
/// Malformed payloads are dropped with a warning; the sending connection is
/// never torn down for them. Relay failures are soft: the referenced room
/// may legitimately be mid-teardown.
pub async fn dispatch_event(state: &AppState, connection_id: ConnectionId, frame: &str) {
    let event = match serde_json::from_str::<ClientEvent>(frame) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                "Dropping malformed frame from connection '{}': {}",
                connection_id,
                e
            );
            return;
        }
    };

    match event {
        ClientEvent::UserInfo {
            name,
            language_tags,
            scene_hint,
            unlocked_scenes,
        } => {
            let profile = Profile {
                name,
                language_tags,
                scene_hint,
                unlocked_scenes: unlocked_scenes.into_iter().collect(),
            };
            if state
                .registry
                .update_attributes(connection_id, profile)
                .await
            {
                state.matchmaker.enqueue(connection_id).await;
            }
        }
        ClientEvent::Offer {
            room_id,
            session_description,
        } => {
            if let Err(e) = state
                .matchmaker
                .relay_offer(room_id, connection_id, session_description)
                .await
            {
                tracing::warn!("Dropping offer: {}", e);
            }
        }
        ClientEvent::Answer {
            room_id,
            session_description,
        } => {
            if let Err(e) = state
                .matchmaker
                .relay_answer(room_id, connection_id, session_description)
                .await
            {
                tracing::warn!("Dropping answer: {}", e);
            }
        }
        ClientEvent::AddIceCandidate {
            room_id,
            candidate,
            role_tag,
        } => {
            if let Err(e) = state
                .matchmaker
                .relay_ice_candidate(room_id, connection_id, candidate, role_tag)
                .await
            {
                tracing::warn!("Dropping ICE candidate: {}", e);
            }
        }
        ClientEvent::RequestSwap { room_id } => {
            if let Err(e) = state.matchmaker.request_swap(room_id, connection_id).await {
                tracing::warn!("Dropping swap request: {}", e);
            }
        }
        ClientEvent::UserExit => {
            state.matchmaker.exit_intentional(connection_id).await;
        }
    }
}

/// Resolve the country for a fresh connection in a detached task.
fn spawn_country_lookup(
    registry: Arc<ConnectionRegistry>,
    resolver: Arc<dyn CountryResolver>,
    connection_id: ConnectionId,
    ip: IpAddr,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match resolver.resolve(ip).await {
            Ok(country) => registry.set_country(connection_id, country).await,
            Err(e) => {
                tracing::debug!(
                    "Geography lookup for '{}' failed, keeping \"Unknown\": {}",
                    connection_id,
                    e
                );
            }
        }
    })
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: usize,
    pub queued: usize,
    pub rooms: usize,
}

/// Live counters for the registry, the queue and the room table.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry.count().await,
        queued: state.matchmaker.queue_len().await,
        rooms: state.matchmaker.room_count().await,
    })
}

/// List of live connections, oldest first.
pub async fn get_connections(State(state): State<Arc<AppState>>) -> Json<Vec<ConnectionSummary>> {
    let connections = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|conn| ConnectionSummary {
            id: conn.id,
            name: conn.name,
            country: conn.country,
            connected_at: timestamp_to_rfc3339(conn.connected_at),
        })
        .collect();
    Json(connections)
}
