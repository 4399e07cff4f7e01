//! Match queue and room lifecycle management.
//!
//! The queue, the room table and the reverse membership index form one
//! guarded aggregate behind a single mutex: a connection is either waiting
//! in the queue or bound to exactly one room, never both, and every pairing
//! decision is made under the lock so concurrent arrivals cannot be paired
//! twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{Connection, ConnectionId, Role, Room, RoomId, select_theme};
use crate::protocol::ServerEvent;

use super::registry::ConnectionRegistry;

/// How long a torn-down room lingers before physical removal and before the
/// survivor re-enters the queue.
///
/// Clients reset their session state on `room-removed` and must wait at
/// least this long before assuming a fresh match may exist; the server in
/// turn guarantees no frame of the old room arrives after the window. Both
/// sides share this one constant rather than two independently chosen
/// numbers.
pub const ROOM_GRACE_DELAY: Duration = Duration::from_millis(1800);

/// Errors for relay operations targeting a room.
///
/// None of these are fatal: the originating connection may simply be
/// mid-teardown, so callers log and drop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("room '{0}' does not exist")]
    UnknownRoom(RoomId),

    #[error("room '{0}' is already closed")]
    RoomClosed(RoomId),

    #[error("connection '{1}' is not a participant of room '{0}'")]
    NotAParticipant(RoomId, ConnectionId),

    #[error("peer of connection '{1}' in room '{0}' is unreachable")]
    PeerUnreachable(RoomId, ConnectionId),
}

struct MatchState {
    /// Connections awaiting a partner, oldest first. A connection id appears
    /// at most once.
    queue: Vec<ConnectionId>,
    /// Active rooms plus closed rooms still inside their grace window.
    rooms: HashMap<RoomId, Room>,
    /// Reverse index: which room a connection is currently bound to. Closed
    /// rooms have no entries here.
    membership: HashMap<ConnectionId, RoomId>,
}

/// Owner of the match queue and the room table.
///
/// Cheaply cloneable; clones share the same state and registry.
#[derive(Clone)]
pub struct Matchmaker {
    registry: Arc<ConnectionRegistry>,
    state: Arc<Mutex<MatchState>>,
    grace_delay: Duration,
}

impl Matchmaker {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_grace_delay(registry, ROOM_GRACE_DELAY)
    }

    /// Create a matchmaker with a custom grace delay (shortened in tests).
    pub fn with_grace_delay(registry: Arc<ConnectionRegistry>, grace_delay: Duration) -> Self {
        Self {
            registry,
            state: Arc::new(Mutex::new(MatchState {
                queue: Vec::new(),
                rooms: HashMap::new(),
                membership: HashMap::new(),
            })),
            grace_delay,
        }
    }

    /// Append a connection to the queue and attempt pairing.
    ///
    /// Idempotent: a connection already waiting keeps its single slot, and a
    /// connection currently bound to a room is refused. Every call
    /// broadcasts the queue depth to all waiting connections.
    pub async fn enqueue(&self, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;
        if state.membership.contains_key(&connection_id) {
            tracing::warn!(
                "Refusing to enqueue connection '{}': still bound to a room",
                connection_id
            );
            return;
        }
        if state.queue.contains(&connection_id) {
            tracing::debug!("Connection '{}' is already queued", connection_id);
        } else {
            if !self.registry.is_live(connection_id).await {
                tracing::warn!(
                    "Refusing to enqueue unregistered connection '{}'",
                    connection_id
                );
                return;
            }
            state.queue.push(connection_id);
            tracing::info!(
                "Connection '{}' queued (depth {})",
                connection_id,
                state.queue.len()
            );
        }
        self.broadcast_queue_count(&state).await;
        if self.pair_waiting(&mut state).await {
            self.broadcast_queue_count(&state).await;
        }
    }

    /// Pair waiting connections two at a time.
    ///
    /// Returns `true` if the queue changed structurally.
    async fn pair_waiting(&self, state: &mut MatchState) -> bool {
        let mut changed = false;
        while state.queue.len() >= 2 {
            // Pop the two most recently enqueued waiters. This bounds the
            // oldest waiter's delay only probabilistically under continuous
            // arrivals; the fairness trade-off is recorded in DESIGN.md.
            let (Some(first), Some(second)) = (state.queue.pop(), state.queue.pop()) else {
                break;
            };
            changed = true;
            let first_conn = self.registry.snapshot(first).await;
            let second_conn = self.registry.snapshot(second).await;
            match (first_conn, second_conn) {
                (Some(a), Some(b)) => self.open_room(state, a, b).await,
                (Some(_), None) => {
                    tracing::warn!(
                        "Pairing race: connection '{}' vanished, requeueing '{}'",
                        second,
                        first
                    );
                    state.queue.push(first);
                    break;
                }
                (None, Some(_)) => {
                    tracing::warn!(
                        "Pairing race: connection '{}' vanished, requeueing '{}'",
                        first,
                        second
                    );
                    state.queue.push(second);
                    break;
                }
                (None, None) => {
                    tracing::warn!("Pairing race: both popped candidates vanished");
                    break;
                }
            }
        }
        changed
    }

    /// Create a room for two live candidates and notify the initiator.
    async fn open_room(&self, state: &mut MatchState, a: Connection, b: Connection) {
        let topic_id = select_theme(&a.unlocked_scenes, &b.unlocked_scenes);
        let room = Room::new(RoomId::generate(), a.id, b.id, topic_id.clone());
        let room_id = room.id;
        state.membership.insert(a.id, room_id);
        state.membership.insert(b.id, room_id);
        state.rooms.insert(room_id, room);
        tracing::info!(
            "Room '{}' created: '{}' (role a) with '{}' (role b), topic {:?}",
            room_id,
            a.id,
            b.id,
            topic_id
        );

        // Only the initiator is told about the room here; the other side
        // learns of it passively through the relayed offer. Documented
        // protocol property, not an accident.
        let notice = ServerEvent::SendOffer {
            room_id,
            role: Role::A,
            peer_name: b.name,
            peer_country: b.country,
            topic_id,
        };
        if let Err(e) = self.registry.push_to(a.id, &notice.to_json()).await {
            tracing::warn!("Failed to deliver send-offer for room '{}': {}", room_id, e);
        }
    }

    /// Relay a session-description offer to the sender's peer.
    pub async fn relay_offer(
        &self,
        room_id: RoomId,
        from: ConnectionId,
        session_description: serde_json::Value,
    ) -> Result<(), RelayError> {
        let event = ServerEvent::Offer {
            room_id,
            session_description,
        };
        self.relay_to_peer(room_id, from, event).await
    }

    /// Relay a session-description answer to the sender's peer.
    pub async fn relay_answer(
        &self,
        room_id: RoomId,
        from: ConnectionId,
        session_description: serde_json::Value,
    ) -> Result<(), RelayError> {
        let event = ServerEvent::Answer {
            room_id,
            session_description,
        };
        self.relay_to_peer(room_id, from, event).await
    }

    /// Relay an ICE candidate to the sender's peer.
    ///
    /// The role tag travels with the candidate so the receiver can apply it
    /// to the correct negotiation leg; each side runs its own
    /// sender/receiver handshake.
    pub async fn relay_ice_candidate(
        &self,
        room_id: RoomId,
        from: ConnectionId,
        candidate: serde_json::Value,
        role_tag: Role,
    ) -> Result<(), RelayError> {
        let event = ServerEvent::AddIceCandidate {
            room_id,
            candidate,
            role_tag,
        };
        self.relay_to_peer(room_id, from, event).await
    }

    /// Validate membership and forward a frame to the other participant.
    async fn relay_to_peer(
        &self,
        room_id: RoomId,
        from: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), RelayError> {
        let peer = {
            let state = self.state.lock().await;
            let room = state
                .rooms
                .get(&room_id)
                .ok_or(RelayError::UnknownRoom(room_id))?;
            if room.is_closed() {
                return Err(RelayError::RoomClosed(room_id));
            }
            room.peer_of(from)
                .ok_or(RelayError::NotAParticipant(room_id, from))?
        };
        self.registry
            .push_to(peer, &event.to_json())
            .await
            .map_err(|_| RelayError::PeerUnreachable(room_id, from))
    }

    /// Record swap intent for one participant.
    ///
    /// When both participants have signaled intent within the same room
    /// instance, the roles exchange and both sides receive a `swap-roles`
    /// notification; otherwise the intent persists until agreement or
    /// teardown.
    pub async fn request_swap(
        &self,
        room_id: RoomId,
        from: ConnectionId,
    ) -> Result<(), RelayError> {
        let pair = {
            let mut state = self.state.lock().await;
            let room = state
                .rooms
                .get_mut(&room_id)
                .ok_or(RelayError::UnknownRoom(room_id))?;
            if room.is_closed() {
                return Err(RelayError::RoomClosed(room_id));
            }
            let role = room
                .role_of(from)
                .ok_or(RelayError::NotAParticipant(room_id, from))?;
            if !room.request_swap(role) {
                tracing::debug!(
                    "Swap intent recorded for '{}' in room '{}'",
                    from,
                    room_id
                );
                return Ok(());
            }
            [room.participant(Role::A), room.participant(Role::B)]
        };
        tracing::info!("Room '{}' roles exchanged", room_id);
        let frame = ServerEvent::SwapRoles { room_id }.to_json();
        self.registry.push_to_each(&pair, &frame).await;
        Ok(())
    }

    /// Intentional leave: tear the room down and requeue the peer.
    ///
    /// The exiting connection stays registered and is *not* requeued here;
    /// it re-enters through the same `user-info` path used on arrival.
    pub async fn exit_intentional(&self, connection_id: ConnectionId) {
        self.teardown_room_of(connection_id).await;
    }

    /// Hard disconnect: leave the queue and tear the room down.
    ///
    /// Registry removal is the caller's next step; the matchmaker must be
    /// cleaned up first so no dangling id lingers in queue or rooms.
    pub async fn exit_ungraceful(&self, connection_id: ConnectionId) {
        self.remove_from_queue(connection_id).await;
        self.teardown_room_of(connection_id).await;
    }

    async fn remove_from_queue(&self, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;
        if let Some(position) = state.queue.iter().position(|&id| id == connection_id) {
            state.queue.remove(position);
            tracing::info!(
                "Connection '{}' left the queue (depth {})",
                connection_id,
                state.queue.len()
            );
            self.broadcast_queue_count(&state).await;
        }
    }

    /// Close the room containing this connection, if any. Idempotent: the
    /// membership entry is consumed on the first call, so a teardown that
    /// fires twice notifies and requeues the survivor exactly once.
    async fn teardown_room_of(&self, connection_id: ConnectionId) {
        let (room_id, survivor) = {
            let mut state = self.state.lock().await;
            let Some(room_id) = state.membership.remove(&connection_id) else {
                return;
            };
            let survivor = match state.rooms.get_mut(&room_id) {
                Some(room) => {
                    let peer = room.peer_of(connection_id);
                    room.close();
                    peer
                }
                None => None,
            };
            if let Some(peer) = survivor {
                state.membership.remove(&peer);
            }
            (room_id, survivor)
        };
        tracing::info!(
            "Room '{}' closing after departure of '{}'",
            room_id,
            connection_id
        );
        if let Some(peer) = survivor {
            if let Err(e) = self
                .registry
                .push_to(peer, &ServerEvent::RoomRemoved.to_json())
                .await
            {
                tracing::warn!(
                    "Failed to notify '{}' that room '{}' was removed: {}",
                    peer,
                    room_id,
                    e
                );
            }
        }

        // The closed room lingers for the grace window so stale relays are
        // recognized and dropped; the survivor re-enters the queue only once
        // the window has passed.
        let matchmaker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(matchmaker.grace_delay).await;
            {
                let mut state = matchmaker.state.lock().await;
                state.rooms.remove(&room_id);
            }
            if let Some(peer) = survivor {
                matchmaker.enqueue(peer).await;
            }
        });
    }

    async fn broadcast_queue_count(&self, state: &MatchState) {
        if state.queue.is_empty() {
            return;
        }
        let frame = ServerEvent::QueueCount {
            count: state.queue.len(),
        }
        .to_json();
        self.registry.push_to_each(&state.queue, &frame).await;
    }

    /// Number of connections awaiting a partner.
    pub async fn queue_len(&self) -> usize {
        let state = self.state.lock().await;
        state.queue.len()
    }

    /// Number of open rooms (closed rooms inside their grace window are not
    /// counted).
    pub async fn room_count(&self) -> usize {
        let state = self.state.lock().await;
        state.rooms.values().filter(|room| !room.is_closed()).count()
    }

    /// Whether the connection is currently waiting in the queue.
    pub async fn is_queued(&self, connection_id: ConnectionId) -> bool {
        let state = self.state.lock().await;
        state.queue.contains(&connection_id)
    }

    /// The room this connection is currently bound to, if any.
    pub async fn room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        let state = self.state.lock().await;
        state.membership.get(&connection_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::domain::Profile;

    const TEST_GRACE: Duration = Duration::from_millis(20);

    fn setup() -> (Arc<ConnectionRegistry>, Matchmaker) {
        let registry = Arc::new(ConnectionRegistry::new());
        let matchmaker = Matchmaker::with_grace_delay(registry.clone(), TEST_GRACE);
        (registry, matchmaker)
    }

    async fn connect(
        registry: &ConnectionRegistry,
        name: &str,
        scenes: &[&str],
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(id, tx).await;
        registry
            .update_attributes(
                id,
                Profile {
                    name: name.to_string(),
                    language_tags: Vec::new(),
                    scene_hint: None,
                    unlocked_scenes: scenes.iter().map(|s| s.to_string()).collect(),
                },
            )
            .await;
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(&frame).expect("server frames are valid JSON"));
        }
        events
    }

    fn find_send_offer(events: &[ServerEvent]) -> Option<ServerEvent> {
        events
            .iter()
            .find(|e| matches!(e, ServerEvent::SendOffer { .. }))
            .cloned()
    }

    async fn wait_out_grace() {
        tokio::time::sleep(TEST_GRACE * 5).await;
    }

    /// Pair two fresh connections and return (initiator, peer, room id) with
    /// both receivers drained up to the pairing.
    async fn paired(
        registry: &ConnectionRegistry,
        matchmaker: &Matchmaker,
    ) -> (
        ConnectionId,
        mpsc::UnboundedReceiver<String>,
        ConnectionId,
        mpsc::UnboundedReceiver<String>,
        RoomId,
    ) {
        let (alice, mut alice_rx) = connect(registry, "alice", &["scene-1"]).await;
        let (bob, mut bob_rx) = connect(registry, "bob", &["scene-1"]).await;
        matchmaker.enqueue(alice).await;
        matchmaker.enqueue(bob).await;
        // bob was popped first, so bob is the initiator (role A)
        let offer_notice = find_send_offer(&drain(&mut bob_rx)).expect("initiator notified");
        let ServerEvent::SendOffer { room_id, .. } = offer_notice else {
            unreachable!();
        };
        drain(&mut alice_rx);
        (bob, bob_rx, alice, alice_rx, room_id)
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (alice, mut alice_rx) = connect(&registry, "alice", &[]).await;

        // when (operation): the same still-idle connection enqueues twice
        matchmaker.enqueue(alice).await;
        matchmaker.enqueue(alice).await;

        // then (expected result): exactly one queue slot
        assert_eq!(matchmaker.queue_len().await, 1);
        // both calls broadcast the (unchanged) depth
        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, ServerEvent::QueueCount { count: 1 })));
    }

    #[tokio::test]
    async fn test_unregistered_connection_is_not_enqueued() {
        // given (precondition):
        let (_registry, matchmaker) = setup();

        // when (operation):
        matchmaker.enqueue(ConnectionId::generate()).await;

        // then (expected result):
        assert_eq!(matchmaker.queue_len().await, 0);
    }

    #[tokio::test]
    async fn test_pairing_creates_room_and_notifies_initiator_only() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (alice, mut alice_rx) = connect(&registry, "alice", &["scene-1", "scene-2"]).await;
        let (bob, mut bob_rx) = connect(&registry, "bob", &["scene-2", "scene-3"]).await;

        // when (operation):
        matchmaker.enqueue(alice).await;
        matchmaker.enqueue(bob).await;

        // then (expected result): queue drained, one room, distinct members
        assert_eq!(matchmaker.queue_len().await, 0);
        assert_eq!(matchmaker.room_count().await, 1);
        let room = matchmaker.room_of(alice).await.unwrap();
        assert_eq!(matchmaker.room_of(bob).await, Some(room));

        // bob was popped first and is the designated initiator
        let bob_events = drain(&mut bob_rx);
        match find_send_offer(&bob_events) {
            Some(ServerEvent::SendOffer {
                room_id,
                role,
                peer_name,
                topic_id,
                ..
            }) => {
                assert_eq!(room_id, room);
                assert_eq!(role, Role::A);
                assert_eq!(peer_name, "alice");
                // forced intersection of the two unlocked sets
                assert_eq!(topic_id, Some("scene-2".to_string()));
            }
            other => panic!("expected send-offer, got {:?}", other),
        }
        // alice learns of the room only through the relayed offer
        assert!(find_send_offer(&drain(&mut alice_rx)).is_none());
    }

    #[tokio::test]
    async fn test_third_arrival_waits_after_first_pair_forms() {
        // given (precondition): three arrivals in order
        let (registry, matchmaker) = setup();
        let (alice, _alice_rx) = connect(&registry, "alice", &[]).await;
        let (bob, _bob_rx) = connect(&registry, "bob", &[]).await;
        let (carol, _carol_rx) = connect(&registry, "carol", &[]).await;

        // when (operation):
        matchmaker.enqueue(alice).await;
        matchmaker.enqueue(bob).await;
        matchmaker.enqueue(carol).await;

        // then (expected result): alice and bob paired; carol waits alone
        assert!(matchmaker.room_of(alice).await.is_some());
        assert!(matchmaker.room_of(bob).await.is_some());
        assert!(matchmaker.is_queued(carol).await);
        assert_eq!(matchmaker.queue_len().await, 1);
    }

    #[tokio::test]
    async fn test_roomed_connection_cannot_be_queued() {
        // given (precondition): alice is bound to a room
        let (registry, matchmaker) = setup();
        let (_bob, _bob_rx, alice, _alice_rx, _room) = paired(&registry, &matchmaker).await;

        // when (operation):
        matchmaker.enqueue(alice).await;

        // then (expected result): queue and room membership stay exclusive
        assert_eq!(matchmaker.queue_len().await, 0);
        assert!(matchmaker.room_of(alice).await.is_some());
    }

    #[tokio::test]
    async fn test_pairing_race_requeues_the_valid_candidate() {
        // given (precondition): alice queued, then gone from the registry
        let (registry, matchmaker) = setup();
        let (alice, _alice_rx) = connect(&registry, "alice", &[]).await;
        let (bob, _bob_rx) = connect(&registry, "bob", &[]).await;
        matchmaker.enqueue(alice).await;
        registry.remove(alice).await;

        // when (operation): bob arrives and triggers a pairing pass
        matchmaker.enqueue(bob).await;

        // then (expected result): no room; bob is back in the queue alone
        assert_eq!(matchmaker.room_count().await, 0);
        assert!(matchmaker.is_queued(bob).await);
        assert_eq!(matchmaker.queue_len().await, 1);
    }

    #[tokio::test]
    async fn test_offer_is_relayed_verbatim_to_the_peer_only() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, mut initiator_rx, peer, mut peer_rx, room_id) =
            paired(&registry, &matchmaker).await;
        let (_other, mut other_rx) = connect(&registry, "carol", &[]).await;
        let description = json!({"type": "offer", "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1"});

        // when (operation):
        matchmaker
            .relay_offer(room_id, initiator, description.clone())
            .await
            .unwrap();

        // then (expected result): delivered unmodified, to the peer only
        let peer_events = drain(&mut peer_rx);
        assert_eq!(
            peer_events,
            vec![ServerEvent::Offer {
                room_id,
                session_description: description,
            }]
        );
        assert!(drain(&mut initiator_rx).is_empty());
        assert!(drain(&mut other_rx).is_empty());
        let _ = peer;
    }

    #[tokio::test]
    async fn test_answer_is_relayed_back() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, mut initiator_rx, peer, _peer_rx, room_id) =
            paired(&registry, &matchmaker).await;
        let description = json!({"type": "answer", "sdp": "v=0"});

        // when (operation):
        matchmaker
            .relay_answer(room_id, peer, description.clone())
            .await
            .unwrap();

        // then (expected result):
        assert_eq!(
            drain(&mut initiator_rx),
            vec![ServerEvent::Answer {
                room_id,
                session_description: description,
            }]
        );
        let _ = initiator;
    }

    #[tokio::test]
    async fn test_ice_candidate_preserves_role_tag() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, _initiator_rx, _peer, mut peer_rx, room_id) =
            paired(&registry, &matchmaker).await;
        let candidate = json!({"candidate": "candidate:1 1 UDP 2122252543 192.0.2.1 54321 typ host"});

        // when (operation): the initiator sends a candidate for its B leg
        matchmaker
            .relay_ice_candidate(room_id, initiator, candidate.clone(), Role::B)
            .await
            .unwrap();

        // then (expected result): same candidate, same leg tag
        assert_eq!(
            drain(&mut peer_rx),
            vec![ServerEvent::AddIceCandidate {
                room_id,
                candidate,
                role_tag: Role::B,
            }]
        );
    }

    #[tokio::test]
    async fn test_relay_validates_room_and_membership() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, _initiator_rx, _peer, _peer_rx, room_id) =
            paired(&registry, &matchmaker).await;
        let (stranger, _stranger_rx) = connect(&registry, "mallory", &[]).await;
        let unknown_room = RoomId::generate();

        // then (expected result):
        assert_eq!(
            matchmaker
                .relay_offer(unknown_room, initiator, json!({}))
                .await,
            Err(RelayError::UnknownRoom(unknown_room))
        );
        assert_eq!(
            matchmaker.relay_offer(room_id, stranger, json!({})).await,
            Err(RelayError::NotAParticipant(room_id, stranger))
        );
    }

    #[tokio::test]
    async fn test_swap_requires_mutual_intent() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, mut initiator_rx, peer, mut peer_rx, room_id) =
            paired(&registry, &matchmaker).await;

        // when (operation): only one side signals intent
        matchmaker.request_swap(room_id, initiator).await.unwrap();

        // then (expected result): nobody is notified
        assert!(drain(&mut initiator_rx).is_empty());
        assert!(drain(&mut peer_rx).is_empty());

        // when (operation): the other side agrees
        matchmaker.request_swap(room_id, peer).await.unwrap();

        // then (expected result): both sides get exactly one swap-roles
        assert_eq!(
            drain(&mut initiator_rx),
            vec![ServerEvent::SwapRoles { room_id }]
        );
        assert_eq!(drain(&mut peer_rx), vec![ServerEvent::SwapRoles { room_id }]);

        // flags were reset: a fresh one-sided intent does not swap again
        matchmaker.request_swap(room_id, peer).await.unwrap();
        assert!(drain(&mut initiator_rx).is_empty());
        assert!(drain(&mut peer_rx).is_empty());
    }

    #[tokio::test]
    async fn test_intentional_exit_notifies_peer_once_and_requeues_after_grace() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, _initiator_rx, peer, mut peer_rx, _room_id) =
            paired(&registry, &matchmaker).await;

        // when (operation):
        matchmaker.exit_intentional(initiator).await;

        // then (expected result): exactly one room-removed, no early requeue
        assert_eq!(drain(&mut peer_rx), vec![ServerEvent::RoomRemoved]);
        assert_eq!(matchmaker.queue_len().await, 0);

        wait_out_grace().await;

        // the survivor is waiting again; the exiting side is not
        assert!(matchmaker.is_queued(peer).await);
        assert!(!matchmaker.is_queued(initiator).await);
        assert_eq!(matchmaker.queue_len().await, 1);
        assert_eq!(matchmaker.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_double_teardown_requeues_survivor_exactly_once() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (initiator, _initiator_rx, peer, mut peer_rx, _room_id) =
            paired(&registry, &matchmaker).await;

        // when (operation): teardown fires twice for the same departure
        matchmaker.exit_intentional(initiator).await;
        matchmaker.exit_ungraceful(initiator).await;

        wait_out_grace().await;

        // then (expected result): one notification, one queue slot
        let removed: Vec<ServerEvent> = drain(&mut peer_rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::RoomRemoved))
            .collect();
        assert_eq!(removed, vec![ServerEvent::RoomRemoved]);
        assert_eq!(matchmaker.queue_len().await, 1);
        assert!(matchmaker.is_queued(peer).await);
    }

    #[tokio::test]
    async fn test_relay_into_closed_room_is_dropped_during_grace() {
        // given (precondition): the room just closed, grace window open
        let (registry, matchmaker) = setup();
        let (initiator, _initiator_rx, peer, mut peer_rx, room_id) =
            paired(&registry, &matchmaker).await;
        matchmaker.exit_intentional(initiator).await;
        drain(&mut peer_rx);

        // when (operation): a stale frame from the survivor arrives
        let result = matchmaker.relay_offer(room_id, peer, json!({})).await;

        // then (expected result): recognized as closed, nothing delivered
        assert_eq!(result, Err(RelayError::RoomClosed(room_id)));
        assert!(drain(&mut peer_rx).is_empty());
    }

    #[tokio::test]
    async fn test_ungraceful_exit_of_queued_connection_empties_queue() {
        // given (precondition):
        let (registry, matchmaker) = setup();
        let (alice, _alice_rx) = connect(&registry, "alice", &[]).await;
        matchmaker.enqueue(alice).await;

        // when (operation):
        matchmaker.exit_ungraceful(alice).await;

        // then (expected result):
        assert_eq!(matchmaker.queue_len().await, 0);
        assert!(!matchmaker.is_queued(alice).await);
    }

    #[tokio::test]
    async fn test_departed_survivor_is_not_requeued() {
        // given (precondition): the survivor disconnects during the grace
        // window
        let (registry, matchmaker) = setup();
        let (initiator, _initiator_rx, peer, _peer_rx, _room_id) =
            paired(&registry, &matchmaker).await;
        matchmaker.exit_intentional(initiator).await;
        matchmaker.exit_ungraceful(peer).await;
        registry.remove(peer).await;

        // when (operation):
        wait_out_grace().await;

        // then (expected result): nobody waits on behalf of a dead transport
        assert_eq!(matchmaker.queue_len().await, 0);
    }
}
