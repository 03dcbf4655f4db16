//! In-process loopback transport
//!
//! [`LoopbackHub`] plays the part of a room-based multiplayer service inside
//! one process. Each [`connect`](LoopbackHub::connect) yields a transport for
//! one participant plus the queue its callbacks are delivered on; whoever owns
//! the queue pumps it into [`ChatroomNetwork::handle`].
//!
//! Unreliable sends can be dropped at random to exercise gap detection.
//!
//! [`ChatroomNetwork::handle`]: crate::network::ChatroomNetwork::handle

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::RngExt;
use tokio::sync::mpsc;
use voxroom_common::{DeliveryMode, PeerId, SendTarget};

use crate::transport::{RoomCallback, Transport, TransportError, TransportEvent};

/// Error code reported when creating a room whose name is taken
pub const ERROR_ROOM_EXISTS: i16 = 32766;

/// Error code reported when joining a room that does not exist
pub const ERROR_ROOM_NOT_FOUND: i16 = 32758;

#[derive(Debug)]
struct LoopbackRoom {
    host: PeerId,
    members: BTreeSet<PeerId>,
}

#[derive(Default)]
struct HubState {
    next_peer: i32,
    queues: HashMap<PeerId, mpsc::UnboundedSender<TransportEvent>>,
    rooms: HashMap<String, LoopbackRoom>,
    /// Room each connected peer is in
    membership: HashMap<PeerId, String>,
    dropped: u64,
}

impl HubState {
    fn deliver(&self, peer: PeerId, event: TransportEvent) {
        if let Some(tx) = self.queues.get(&peer) {
            // A closed queue means the peer stopped pumping; nothing to do
            let _ = tx.send(event);
        }
    }

    fn room_of(&self, peer: PeerId) -> Option<&LoopbackRoom> {
        let name = self.membership.get(&peer)?;
        self.rooms.get(name)
    }

    /// Remove `peer` from its room and notify everyone involved
    fn leave(&mut self, peer: PeerId) -> Result<(), TransportError> {
        let name = self.membership.remove(&peer).ok_or(TransportError::NotInRoom)?;
        let Some(room) = self.rooms.get_mut(&name) else {
            return Err(TransportError::NotInRoom);
        };

        room.members.remove(&peer);
        let remaining: Vec<PeerId> = room.members.iter().copied().collect();

        let new_host = if room.host == peer {
            remaining.first().copied()
        } else {
            None
        };
        if let Some(host) = new_host {
            room.host = host;
        }
        if remaining.is_empty() {
            self.rooms.remove(&name);
        }

        self.deliver(peer, TransportEvent::Room(RoomCallback::LeftRoom));
        for other in &remaining {
            self.deliver(*other, TransportEvent::Room(RoomCallback::PlayerLeft(peer)));
            if let Some(host) = new_host {
                self.deliver(*other, TransportEvent::Room(RoomCallback::HostChanged(host)));
            }
        }

        log::debug!("Loopback: peer {} left room '{}'", peer, name);
        Ok(())
    }
}

/// Shared in-process room service
#[derive(Clone)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
    /// Probability in `[0, 1]` that an unreliable delivery is dropped
    loss: f64,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    /// Create a lossless hub
    pub fn new() -> Self {
        Self::with_loss(0.0)
    }

    /// Create a hub that drops unreliable deliveries with probability `loss`
    ///
    /// `loss` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn with_loss(loss: f64) -> Self {
        let loss = if loss.is_nan() { 0.0 } else { loss.clamp(0.0, 1.0) };
        Self {
            state: Arc::new(Mutex::new(HubState {
                next_peer: 1,
                ..HubState::default()
            })),
            loss,
        }
    }

    /// Configured drop probability
    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// Register a new participant
    ///
    /// Returns its transport and the queue its callbacks arrive on.
    pub fn connect(&self) -> (LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let peer = PeerId(state.next_peer);
        state.next_peer += 1;
        state.queues.insert(peer, tx);

        let transport = LoopbackTransport {
            hub: self.clone(),
            peer,
        };
        (transport, rx)
    }

    /// Number of rooms currently open
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    /// Members of `room`, ascending
    pub fn members(&self, room: &str) -> Vec<PeerId> {
        self.lock()
            .rooms
            .get(room)
            .map(|r| r.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Deliveries dropped by simulated loss so far
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One participant's handle on a [`LoopbackHub`]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    peer: PeerId,
}

impl LoopbackTransport {
    /// Participant id assigned by the hub
    pub fn peer_id(&self) -> PeerId {
        self.peer
    }

    /// Leave any room and stop receiving deliveries
    pub fn disconnect(&self) {
        let mut state = self.hub.lock();
        if state.membership.contains_key(&self.peer) {
            let _ = state.leave(self.peer);
        }
        state.queues.remove(&self.peer);
    }
}

impl Transport for LoopbackTransport {
    fn raise_event(
        &self,
        tag: u8,
        payload: &[u8],
        target: SendTarget,
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        let room = state.room_of(self.peer).ok_or(TransportError::NotInRoom)?;

        // Unknown targets are dropped silently, like a real room service
        let recipients: Vec<PeerId> = match target {
            SendTarget::Peer(peer) if room.members.contains(&peer) => vec![peer],
            SendTarget::Peer(_) => Vec::new(),
            SendTarget::Others => room
                .members
                .iter()
                .copied()
                .filter(|p| *p != self.peer)
                .collect(),
        };

        let mut rng = rand::rng();
        for recipient in recipients {
            if !delivery.is_reliable() && self.hub.loss > 0.0 && rng.random_bool(self.hub.loss) {
                state.dropped += 1;
                continue;
            }
            state.deliver(
                recipient,
                TransportEvent::Custom {
                    tag,
                    sender: self.peer,
                    payload: payload.to_vec(),
                },
            );
        }
        Ok(())
    }

    fn create_room(&self, room: &str) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        if state.membership.contains_key(&self.peer) {
            return Err(TransportError::NotReady("already in a room".to_string()));
        }

        if state.rooms.contains_key(room) {
            state.deliver(
                self.peer,
                TransportEvent::Room(RoomCallback::CreateRoomFailed {
                    code: ERROR_ROOM_EXISTS,
                    message: format!("room '{}' already exists", room),
                }),
            );
            return Ok(());
        }

        state.rooms.insert(
            room.to_string(),
            LoopbackRoom {
                host: self.peer,
                members: BTreeSet::from([self.peer]),
            },
        );
        state.membership.insert(self.peer, room.to_string());
        state.deliver(
            self.peer,
            TransportEvent::Room(RoomCallback::JoinedRoom {
                room: room.to_string(),
                local: self.peer,
                is_host: true,
                present: Vec::new(),
            }),
        );

        log::debug!("Loopback: peer {} created room '{}'", self.peer, room);
        Ok(())
    }

    fn join_room(&self, room: &str) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        if state.membership.contains_key(&self.peer) {
            return Err(TransportError::NotReady("already in a room".to_string()));
        }

        if !state.rooms.contains_key(room) {
            state.deliver(
                self.peer,
                TransportEvent::Room(RoomCallback::JoinRoomFailed {
                    code: ERROR_ROOM_NOT_FOUND,
                    message: format!("room '{}' does not exist", room),
                }),
            );
            return Ok(());
        }

        let present: Vec<PeerId> = match state.rooms.get_mut(room) {
            Some(existing) => {
                let present = existing.members.iter().copied().collect();
                existing.members.insert(self.peer);
                present
            }
            None => Vec::new(),
        };
        state.membership.insert(self.peer, room.to_string());

        state.deliver(
            self.peer,
            TransportEvent::Room(RoomCallback::JoinedRoom {
                room: room.to_string(),
                local: self.peer,
                is_host: false,
                present: present.clone(),
            }),
        );
        for other in present {
            state.deliver(
                other,
                TransportEvent::Room(RoomCallback::PlayerEntered(self.peer)),
            );
        }

        log::debug!("Loopback: peer {} joined room '{}'", self.peer, room);
        Ok(())
    }

    fn leave_room(&self) -> Result<(), TransportError> {
        self.hub.lock().leave(self.peer)
    }
}
