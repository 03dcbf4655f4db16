//! Chatroom network adapter
//!
//! [`ChatroomNetwork`] sits between a voice-chat stack and a room-based
//! multiplayer transport. It renames the transport's room callbacks into
//! [`ChatroomEvent`]s, encodes outgoing audio segments into custom events, and
//! decodes incoming ones.
//!
//! ## Lifecycle
//!
//! `Idle` → [`start`](ChatroomNetwork::start) → `Running` →
//! [`dispose`](ChatroomNetwork::dispose) → `Disposed`. Transport events that
//! arrive outside `Running` are ignored; outbound calls fail.
//!
//! ## Threading
//!
//! All methods take `&self`. Internal state sits behind a mutex that is never
//! held while listeners run, so listeners are free to call back in.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use voxroom_common::{
    AudioSegment, ChatroomEvent, ChatroomEventKind, PeerId, SendTarget, SequenceCheck,
    SequenceTracker, decode_audio_segment, encode_audio_segment,
};

use crate::error::AdapterError;
use crate::events::{EventHub, ListenerId};
use crate::settings::NetworkSettings;
use crate::transport::{RoomCallback, Transport, TransportEvent};

/// Lifecycle phase of a [`ChatroomNetwork`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, not yet started
    Idle,
    /// Handling transport events and accepting requests
    Running,
    /// Shut down for good
    Disposed,
}

/// Membership of the chatroom the local peer is in
#[derive(Debug, Clone)]
struct Room {
    name: String,
    local: PeerId,
    is_host: bool,
    peers: BTreeSet<PeerId>,
}

struct State {
    phase: Phase,
    room: Option<Room>,
    /// Per-sender sequence trackers, keyed by remote peer
    trackers: HashMap<PeerId, SequenceTracker>,
}

/// Voice-chat network adapter over a [`Transport`]
pub struct ChatroomNetwork {
    settings: NetworkSettings,
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
    events: EventHub,
}

impl ChatroomNetwork {
    /// Create an adapter in the `Idle` phase
    pub fn new(settings: NetworkSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
            state: Mutex::new(State {
                phase: Phase::Idle,
                room: None,
                trackers: HashMap::new(),
            }),
            events: EventHub::new(),
        }
    }

    /// Settings this adapter was created with
    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Begin handling transport events
    ///
    /// Starting an already running adapter is a no-op.
    pub fn start(&self) -> Result<(), AdapterError> {
        let mut state = self.lock();
        match state.phase {
            Phase::Idle => {
                state.phase = Phase::Running;
                log::info!(
                    "Chatroom network started (event tag {}, {:?} delivery)",
                    self.settings.event_tag,
                    self.settings.delivery
                );
                Ok(())
            }
            Phase::Running => Ok(()),
            Phase::Disposed => Err(AdapterError::Disposed),
        }
    }

    /// Shut the adapter down
    ///
    /// Leaves the current room, forgets membership, and drops every listener.
    /// No events are emitted for the implicit leave. Disposing twice is a no-op.
    pub fn dispose(&self) {
        let was_in_room = {
            let mut state = self.lock();
            if state.phase == Phase::Disposed {
                return;
            }
            let was_running = state.phase == Phase::Running;
            state.phase = Phase::Disposed;
            state.trackers.clear();
            state.room.take().is_some() && was_running
        };

        if was_in_room && let Err(e) = self.transport.leave_room() {
            log::warn!("Failed to leave room while disposing: {}", e);
        }

        self.events.clear();
        log::info!("Chatroom network disposed");
    }

    // =========================================================================
    // Room requests
    // =========================================================================

    /// Ask the transport to create and host a chatroom
    ///
    /// The outcome arrives as [`ChatroomEvent::Created`] or
    /// [`ChatroomEvent::CreationFailed`].
    pub fn host_chatroom(&self, name: &str) -> Result<(), AdapterError> {
        self.ensure_running()?;
        log::debug!("Requesting to host chatroom '{}'", name);
        self.transport.create_room(name)?;
        Ok(())
    }

    /// Ask the transport to join an existing chatroom
    ///
    /// The outcome arrives as [`ChatroomEvent::Joined`] or
    /// [`ChatroomEvent::JoinFailed`].
    pub fn join_chatroom(&self, name: &str) -> Result<(), AdapterError> {
        self.ensure_running()?;
        log::debug!("Requesting to join chatroom '{}'", name);
        self.transport.join_room(name)?;
        Ok(())
    }

    /// Ask the transport to leave the current chatroom
    ///
    /// The outcome arrives as [`ChatroomEvent::Closed`] (host) or
    /// [`ChatroomEvent::Left`] (guest).
    pub fn leave_chatroom(&self) -> Result<(), AdapterError> {
        {
            let state = self.lock();
            Self::check_running(&state)?;
            if state.room.is_none() {
                return Err(AdapterError::NotInRoom);
            }
        }
        self.transport.leave_room()?;
        Ok(())
    }

    // =========================================================================
    // Audio
    // =========================================================================

    /// Encode `segment` and send it to `target`
    ///
    /// Emits [`ChatroomEvent::AudioSent`] once the transport accepts it.
    pub fn send_audio_segment(
        &self,
        target: SendTarget,
        segment: &AudioSegment,
    ) -> Result<(), AdapterError> {
        {
            let state = self.lock();
            Self::check_running(&state)?;
            if state.room.is_none() {
                return Err(AdapterError::NotInRoom);
            }
        }

        let payload = encode_audio_segment(segment);
        if let Err(e) = self.transport.raise_event(
            self.settings.event_tag,
            &payload,
            target,
            self.settings.delivery,
        ) {
            log::warn!(
                "Failed to send audio segment {} to {}: {}",
                segment.sequence_index(),
                target,
                e
            );
            return Err(e.into());
        }

        self.events.emit(&ChatroomEvent::AudioSent {
            target,
            segment: segment.clone(),
        });
        Ok(())
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Handle one delivery from the transport
    ///
    /// Call this from the transport's delivery thread. Listeners run before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Codec`] when an audio payload is malformed. The
    /// segment has already been dropped and logged; the error is informational.
    pub fn handle(&self, event: TransportEvent) -> Result<(), AdapterError> {
        if self.phase() != Phase::Running {
            log::debug!("Ignoring transport event while not running: {:?}", event);
            return Ok(());
        }

        match event {
            TransportEvent::Room(callback) => {
                let events = self.apply_room_callback(callback);
                for event in &events {
                    self.events.emit(event);
                }
                Ok(())
            }
            TransportEvent::Custom {
                tag,
                sender,
                payload,
            } => self.receive_custom(tag, sender, &payload),
        }
    }

    /// Update membership for a room callback and return the events to emit
    fn apply_room_callback(&self, callback: RoomCallback) -> Vec<ChatroomEvent> {
        let mut state = self.lock();
        if state.phase != Phase::Running {
            return Vec::new();
        }

        match callback {
            RoomCallback::JoinedRoom {
                room,
                local,
                is_host,
                present,
            } => {
                let peers: BTreeSet<PeerId> =
                    present.into_iter().filter(|p| *p != local).collect();

                log::info!(
                    "{} chatroom '{}' as peer {} ({} other peers)",
                    if is_host { "Hosting" } else { "Joined" },
                    room,
                    local,
                    peers.len()
                );

                let mut events = Vec::with_capacity(peers.len() + 2);
                if let Some(previous) = state.room.take() {
                    log::debug!(
                        "Joined '{}' without leaving '{}' first; closing it",
                        room,
                        previous.name
                    );
                    events.push(Self::leave_event(&previous));
                }
                events.push(if is_host {
                    ChatroomEvent::Created { room: room.clone() }
                } else {
                    ChatroomEvent::Joined {
                        room: room.clone(),
                        local,
                    }
                });
                events.extend(peers.iter().map(|p| ChatroomEvent::PeerJoined(*p)));

                state.trackers.clear();
                state.room = Some(Room {
                    name: room,
                    local,
                    is_host,
                    peers,
                });
                events
            }

            RoomCallback::LeftRoom => {
                let Some(room) = state.room.take() else {
                    log::debug!("Left room callback while not in a chatroom");
                    return Vec::new();
                };
                state.trackers.clear();
                log::info!("Left chatroom '{}'", room.name);
                vec![Self::leave_event(&room)]
            }

            RoomCallback::PlayerEntered(peer) => {
                let Some(room) = state.room.as_mut() else {
                    return Vec::new();
                };
                if peer == room.local || !room.peers.insert(peer) {
                    return Vec::new();
                }
                log::debug!("Peer {} joined chatroom '{}'", peer, room.name);
                vec![ChatroomEvent::PeerJoined(peer)]
            }

            RoomCallback::PlayerLeft(peer) => {
                let Some(room) = state.room.as_mut() else {
                    return Vec::new();
                };
                if !room.peers.remove(&peer) {
                    return Vec::new();
                }
                log::debug!("Peer {} left chatroom '{}'", peer, room.name);
                state.trackers.remove(&peer);
                vec![ChatroomEvent::PeerLeft(peer)]
            }

            RoomCallback::HostChanged(host) => {
                if let Some(room) = state.room.as_mut() {
                    room.is_host = host == room.local;
                    log::debug!("Chatroom '{}' is now hosted by peer {}", room.name, host);
                }
                Vec::new()
            }

            RoomCallback::CreateRoomFailed { code, message } => {
                log::warn!("Chatroom creation failed: {} (code {})", message, code);
                vec![ChatroomEvent::CreationFailed {
                    reason: format!("{} (code {})", message, code),
                }]
            }

            RoomCallback::JoinRoomFailed { code, message } => {
                log::warn!("Chatroom join failed: {} (code {})", message, code);
                vec![ChatroomEvent::JoinFailed {
                    reason: format!("{} (code {})", message, code),
                }]
            }
        }
    }

    /// `Closed` for the host, `Left` for a guest
    fn leave_event(room: &Room) -> ChatroomEvent {
        if room.is_host {
            ChatroomEvent::Closed
        } else {
            ChatroomEvent::Left
        }
    }

    fn receive_custom(&self, tag: u8, sender: PeerId, payload: &[u8]) -> Result<(), AdapterError> {
        if tag != self.settings.event_tag {
            return Ok(());
        }

        {
            let mut state = self.lock();
            if state.phase != Phase::Running {
                return Ok(());
            }
            let Some(room) = state.room.as_ref() else {
                log::debug!("Dropping audio from peer {} outside a chatroom", sender);
                return Ok(());
            };
            if self.settings.ignore_own_events && sender == room.local {
                return Ok(());
            }
            if sender != room.local && !room.peers.contains(&sender) {
                log::debug!("Dropping audio from peer {} not in '{}'", sender, room.name);
                return Ok(());
            }

            // Decode before touching the tracker so garbage can't skew it
            let segment = match decode_audio_segment(payload) {
                Ok(segment) => segment,
                Err(e) => {
                    log::warn!(
                        "Dropping malformed audio payload ({} bytes) from peer {}: {}",
                        payload.len(),
                        sender,
                        e
                    );
                    return Err(e.into());
                }
            };

            if self.settings.track_sequence_gaps {
                let check = state
                    .trackers
                    .entry(sender)
                    .or_default()
                    .observe(segment.sequence_index());
                match check {
                    SequenceCheck::Gap { missing } => log::debug!(
                        "Peer {}: {} audio segment(s) missing before {}",
                        sender,
                        missing,
                        segment.sequence_index()
                    ),
                    SequenceCheck::Late { .. } => log::debug!(
                        "Peer {}: late audio segment {}",
                        sender,
                        segment.sequence_index()
                    ),
                    SequenceCheck::First | SequenceCheck::InOrder => {}
                }
            }

            drop(state);
            self.events.emit(&ChatroomEvent::AudioReceived {
                peer: sender,
                segment,
            });
        }

        Ok(())
    }

    // =========================================================================
    // Membership queries
    // =========================================================================

    /// Local peer id while in a chatroom
    pub fn own_id(&self) -> Option<PeerId> {
        self.lock().room.as_ref().map(|r| r.local)
    }

    /// Remote peers in the current chatroom, ascending
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.lock()
            .room
            .as_ref()
            .map(|r| r.peers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Name of the current chatroom
    pub fn room_name(&self) -> Option<String> {
        self.lock().room.as_ref().map(|r| r.name.clone())
    }

    /// Whether the local peer hosts the current chatroom
    pub fn is_host(&self) -> bool {
        self.lock().room.as_ref().is_some_and(|r| r.is_host)
    }

    /// Sequence statistics for audio received from `peer`
    pub fn sequence_stats(&self, peer: PeerId) -> Option<SequenceTracker> {
        self.lock().trackers.get(&peer).cloned()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Call `callback` for every event of `kind`
    pub fn subscribe<F>(&self, kind: ChatroomEventKind, callback: F) -> ListenerId
    where
        F: Fn(&ChatroomEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, callback)
    }

    /// Call `callback` for every event
    pub fn subscribe_all<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChatroomEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_all(callback)
    }

    /// Receive every event on an unbounded channel
    pub fn subscribe_channel(&self) -> (ListenerId, mpsc::UnboundedReceiver<ChatroomEvent>) {
        self.events.subscribe_channel()
    }

    /// Remove a listener; returns `false` if it was already gone
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_running(&self) -> Result<(), AdapterError> {
        Self::check_running(&self.lock())
    }

    fn check_running(state: &State) -> Result<(), AdapterError> {
        match state.phase {
            Phase::Running => Ok(()),
            Phase::Idle => Err(AdapterError::NotStarted),
            Phase::Disposed => Err(AdapterError::Disposed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use voxroom_common::DeliveryMode;

    /// Transport that records outbound calls
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(u8, Vec<u8>, SendTarget, DeliveryMode)>>,
        requests: Mutex<Vec<String>>,
        fail_sends: bool,
    }

    impl Transport for RecordingTransport {
        fn raise_event(
            &self,
            tag: u8,
            payload: &[u8],
            target: SendTarget,
            delivery: DeliveryMode,
        ) -> Result<(), TransportError> {
            if self.fail_sends {
                return Err(TransportError::SendFailed("offline".to_string()));
            }
            self.sent
                .lock()
                .expect("lock")
                .push((tag, payload.to_vec(), target, delivery));
            Ok(())
        }

        fn create_room(&self, room: &str) -> Result<(), TransportError> {
            self.requests.lock().expect("lock").push(format!("create:{room}"));
            Ok(())
        }

        fn join_room(&self, room: &str) -> Result<(), TransportError> {
            self.requests.lock().expect("lock").push(format!("join:{room}"));
            Ok(())
        }

        fn leave_room(&self) -> Result<(), TransportError> {
            self.requests.lock().expect("lock").push("leave".to_string());
            Ok(())
        }
    }

    fn started() -> (Arc<RecordingTransport>, ChatroomNetwork) {
        let transport = Arc::new(RecordingTransport::default());
        let network = ChatroomNetwork::new(NetworkSettings::default(), transport.clone());
        network.start().expect("start");
        (transport, network)
    }

    fn collect(network: &ChatroomNetwork) -> Arc<Mutex<Vec<ChatroomEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        network.subscribe_all(move |event| sink.lock().expect("lock").push(event.clone()));
        seen
    }

    fn joined(local: i32, is_host: bool, present: &[i32]) -> TransportEvent {
        TransportEvent::Room(RoomCallback::JoinedRoom {
            room: "lobby".to_string(),
            local: PeerId(local),
            is_host,
            present: present.iter().map(|p| PeerId(*p)).collect(),
        })
    }

    fn audio(sender: i32, segment: &AudioSegment) -> TransportEvent {
        TransportEvent::Custom {
            tag: 1,
            sender: PeerId(sender),
            payload: segment.to_bytes(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let transport = Arc::new(RecordingTransport::default());
        let network = ChatroomNetwork::new(NetworkSettings::default(), transport);
        assert_eq!(network.phase(), Phase::Idle);
        assert_eq!(network.host_chatroom("x"), Err(AdapterError::NotStarted));

        network.start().expect("start");
        network.start().expect("start is idempotent");
        assert_eq!(network.phase(), Phase::Running);

        network.dispose();
        network.dispose();
        assert_eq!(network.phase(), Phase::Disposed);
        assert_eq!(network.start(), Err(AdapterError::Disposed));
        assert_eq!(network.join_chatroom("x"), Err(AdapterError::Disposed));
    }

    #[test]
    fn test_room_requests_forwarded() {
        let (transport, network) = started();
        network.host_chatroom("lobby").expect("host");
        network.join_chatroom("other").expect("join");
        assert_eq!(network.leave_chatroom(), Err(AdapterError::NotInRoom));

        network.handle(joined(1, true, &[])).expect("handle");
        network.leave_chatroom().expect("leave");

        assert_eq!(
            *transport.requests.lock().expect("lock"),
            vec!["create:lobby", "join:other", "leave"]
        );
    }

    #[test]
    fn test_host_joined_maps_to_created() {
        let (_transport, network) = started();
        let seen = collect(&network);

        network.handle(joined(1, true, &[])).expect("handle");

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![ChatroomEvent::Created {
                room: "lobby".to_string()
            }]
        );
        assert!(network.is_host());
        assert_eq!(network.own_id(), Some(PeerId(1)));
        assert_eq!(network.room_name().as_deref(), Some("lobby"));
    }

    #[test]
    fn test_guest_joined_announces_present_peers() {
        let (_transport, network) = started();
        let seen = collect(&network);

        network.handle(joined(3, false, &[2, 1, 3])).expect("handle");

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                ChatroomEvent::Joined {
                    room: "lobby".to_string(),
                    local: PeerId(3)
                },
                ChatroomEvent::PeerJoined(PeerId(1)),
                ChatroomEvent::PeerJoined(PeerId(2)),
            ]
        );
        assert!(!network.is_host());
        assert_eq!(network.peer_ids(), vec![PeerId(1), PeerId(2)]);
    }

    #[test]
    fn test_peer_membership_changes() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[])).expect("handle");
        let seen = collect(&network);

        let room = |cb| TransportEvent::Room(cb);
        network.handle(room(RoomCallback::PlayerEntered(PeerId(2)))).expect("handle");
        // Duplicate enter and own id produce nothing
        network.handle(room(RoomCallback::PlayerEntered(PeerId(2)))).expect("handle");
        network.handle(room(RoomCallback::PlayerEntered(PeerId(1)))).expect("handle");
        network.handle(room(RoomCallback::PlayerLeft(PeerId(2)))).expect("handle");
        // Unknown peer leaving produces nothing
        network.handle(room(RoomCallback::PlayerLeft(PeerId(9)))).expect("handle");

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                ChatroomEvent::PeerJoined(PeerId(2)),
                ChatroomEvent::PeerLeft(PeerId(2)),
            ]
        );
        assert!(network.peer_ids().is_empty());
    }

    #[test]
    fn test_left_room_host_closes_guest_leaves() {
        let (_transport, host) = started();
        host.handle(joined(1, true, &[])).expect("handle");
        let host_seen = collect(&host);
        host.handle(TransportEvent::Room(RoomCallback::LeftRoom)).expect("handle");
        assert_eq!(*host_seen.lock().expect("lock"), vec![ChatroomEvent::Closed]);
        assert_eq!(host.own_id(), None);

        let (_transport, guest) = started();
        guest.handle(joined(2, false, &[1])).expect("handle");
        let guest_seen = collect(&guest);
        guest.handle(TransportEvent::Room(RoomCallback::LeftRoom)).expect("handle");
        // A second leave is ignored
        guest.handle(TransportEvent::Room(RoomCallback::LeftRoom)).expect("handle");
        assert_eq!(*guest_seen.lock().expect("lock"), vec![ChatroomEvent::Left]);
    }

    #[test]
    fn test_host_migration() {
        let (_transport, network) = started();
        network.handle(joined(2, false, &[1])).expect("handle");
        network
            .handle(TransportEvent::Room(RoomCallback::HostChanged(PeerId(2))))
            .expect("handle");
        assert!(network.is_host());

        let seen = collect(&network);
        network.handle(TransportEvent::Room(RoomCallback::LeftRoom)).expect("handle");
        assert_eq!(*seen.lock().expect("lock"), vec![ChatroomEvent::Closed]);
    }

    #[test]
    fn test_failures_map_to_failed_events() {
        let (_transport, network) = started();
        let seen = collect(&network);

        network
            .handle(TransportEvent::Room(RoomCallback::CreateRoomFailed {
                code: 32766,
                message: "exists".to_string(),
            }))
            .expect("handle");
        network
            .handle(TransportEvent::Room(RoomCallback::JoinRoomFailed {
                code: 32758,
                message: "missing".to_string(),
            }))
            .expect("handle");

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                ChatroomEvent::CreationFailed {
                    reason: "exists (code 32766)".to_string()
                },
                ChatroomEvent::JoinFailed {
                    reason: "missing (code 32758)".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_send_audio_segment() {
        let (transport, network) = started();
        assert_eq!(
            network.send_audio_segment(SendTarget::Others, &AudioSegment::new(0, 48000, 1, vec![])),
            Err(AdapterError::NotInRoom)
        );

        network.handle(joined(1, true, &[2])).expect("handle");
        let sent_events = Arc::new(AtomicUsize::new(0));
        let counter = sent_events.clone();
        network.subscribe(ChatroomEventKind::AudioSent, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let segment = AudioSegment::new(7, 48000, 2, vec![0.1, -0.2, 0.3, -0.4]);
        network
            .send_audio_segment(SendTarget::Peer(PeerId(2)), &segment)
            .expect("send");

        let sent = transport.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        let (tag, payload, target, delivery) = &sent[0];
        assert_eq!(*tag, 1);
        assert_eq!(payload.len(), 32);
        assert_eq!(*target, SendTarget::Peer(PeerId(2)));
        assert_eq!(*delivery, DeliveryMode::Unreliable);
        assert_eq!(decode_audio_segment(payload), Ok(segment));
        assert_eq!(sent_events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_failure_emits_nothing() {
        let transport = Arc::new(RecordingTransport {
            fail_sends: true,
            ..RecordingTransport::default()
        });
        let network = ChatroomNetwork::new(NetworkSettings::default(), transport);
        network.start().expect("start");
        network.handle(joined(1, true, &[2])).expect("handle");
        let seen = collect(&network);

        let result =
            network.send_audio_segment(SendTarget::Others, &AudioSegment::new(0, 48000, 1, vec![]));
        assert!(matches!(result, Err(AdapterError::Transport(_))));
        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_receive_audio() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[2])).expect("handle");
        let seen = collect(&network);

        let segment = AudioSegment::new(0, 48000, 1, vec![0.5; 8]);
        network.handle(audio(2, &segment)).expect("handle");

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![ChatroomEvent::AudioReceived {
                peer: PeerId(2),
                segment
            }]
        );
    }

    #[test]
    fn test_malformed_audio_dropped() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[2])).expect("handle");
        let seen = collect(&network);

        let result = network.handle(TransportEvent::Custom {
            tag: 1,
            sender: PeerId(2),
            payload: vec![1, 2, 3],
        });

        assert!(matches!(result, Err(AdapterError::Codec(_))));
        assert!(seen.lock().expect("lock").is_empty());
        assert!(network.sequence_stats(PeerId(2)).is_none());
    }

    #[test]
    fn test_foreign_tag_and_own_events_ignored() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[2])).expect("handle");
        let seen = collect(&network);

        let segment = AudioSegment::new(0, 48000, 1, vec![0.0]);
        network
            .handle(TransportEvent::Custom {
                tag: 9,
                sender: PeerId(2),
                // Not a segment; must not even be decoded
                payload: vec![0xFF],
            })
            .expect("foreign tag ignored");
        network.handle(audio(1, &segment)).expect("own event ignored");

        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_events_ignored_when_not_running() {
        let transport = Arc::new(RecordingTransport::default());
        let network = ChatroomNetwork::new(NetworkSettings::default(), transport);
        let seen = collect(&network);

        network.handle(joined(1, true, &[])).expect("handle");
        assert!(seen.lock().expect("lock").is_empty());
        assert_eq!(network.own_id(), None);
    }

    #[test]
    fn test_sequence_tracking() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[2])).expect("handle");

        for index in [0, 1, 4, 3] {
            network
                .handle(audio(2, &AudioSegment::new(index, 48000, 1, vec![0.0])))
                .expect("handle");
        }

        let stats = network.sequence_stats(PeerId(2)).expect("tracked");
        assert_eq!(stats.received(), 4);
        assert_eq!(stats.missing(), 2);
        assert_eq!(stats.late(), 1);
        assert_eq!(stats.newest(), Some(4));

        network
            .handle(TransportEvent::Room(RoomCallback::PlayerLeft(PeerId(2))))
            .expect("handle");
        assert!(network.sequence_stats(PeerId(2)).is_none());
    }

    #[test]
    fn test_audio_from_departed_peer_dropped() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[2])).expect("handle");
        network
            .handle(audio(2, &AudioSegment::new(0, 48000, 1, vec![0.0])))
            .expect("handle");
        network
            .handle(TransportEvent::Room(RoomCallback::PlayerLeft(PeerId(2))))
            .expect("handle");
        let seen = collect(&network);

        // Straggler sent before the peer left
        network
            .handle(audio(2, &AudioSegment::new(1, 48000, 1, vec![0.0])))
            .expect("handle");
        // Never a member at all
        network
            .handle(audio(7, &AudioSegment::new(0, 48000, 1, vec![0.0])))
            .expect("handle");

        assert!(seen.lock().expect("lock").is_empty());
        assert!(network.sequence_stats(PeerId(2)).is_none());
        assert!(network.sequence_stats(PeerId(7)).is_none());
    }

    #[test]
    fn test_callbacks_after_dispose_change_nothing() {
        let (_transport, network) = started();
        network.dispose();

        // Callback raced past the phase check in handle()
        let events = network.apply_room_callback(RoomCallback::JoinedRoom {
            room: "lobby".to_string(),
            local: PeerId(1),
            is_host: true,
            present: vec![PeerId(2)],
        });
        assert!(events.is_empty());
        assert_eq!(network.own_id(), None);

        network
            .receive_custom(1, PeerId(2), &AudioSegment::new(0, 48000, 1, vec![0.0]).to_bytes())
            .expect("ignored");
        assert!(network.sequence_stats(PeerId(2)).is_none());
    }

    #[test]
    fn test_joined_while_in_room_leaves_previous() {
        let (_transport, network) = started();
        network.handle(joined(1, true, &[2])).expect("handle");
        let seen = collect(&network);

        network
            .handle(TransportEvent::Room(RoomCallback::JoinedRoom {
                room: "annex".to_string(),
                local: PeerId(1),
                is_host: false,
                present: vec![PeerId(3)],
            }))
            .expect("handle");

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                ChatroomEvent::Closed,
                ChatroomEvent::Joined {
                    room: "annex".to_string(),
                    local: PeerId(1)
                },
                ChatroomEvent::PeerJoined(PeerId(3)),
            ]
        );
        assert_eq!(network.peer_ids(), vec![PeerId(3)]);
        assert_eq!(network.room_name().as_deref(), Some("annex"));
    }

    #[test]
    fn test_listener_can_send_from_callback() {
        let transport = Arc::new(RecordingTransport::default());
        let network = Arc::new(ChatroomNetwork::new(
            NetworkSettings::default(),
            transport.clone(),
        ));
        network.start().expect("start");

        // Greet every new peer with a short segment
        let inner = Arc::downgrade(&network);
        network.subscribe(ChatroomEventKind::PeerJoined, move |event| {
            if let (ChatroomEvent::PeerJoined(peer), Some(network)) = (event, inner.upgrade()) {
                let _ = network.send_audio_segment(
                    SendTarget::Peer(*peer),
                    &AudioSegment::new(0, 48000, 1, vec![0.0]),
                );
            }
        });

        network.handle(joined(1, true, &[])).expect("handle");
        network
            .handle(TransportEvent::Room(RoomCallback::PlayerEntered(PeerId(5))))
            .expect("handle");

        assert_eq!(transport.sent.lock().expect("lock").len(), 1);
    }

    #[test]
    fn test_dispose_leaves_room_and_drops_listeners() {
        let (transport, network) = started();
        network.handle(joined(1, true, &[])).expect("handle");
        let (_id, mut rx) = network.subscribe_channel();

        network.dispose();

        assert_eq!(*transport.requests.lock().expect("lock"), vec!["leave"]);
        assert_eq!(network.own_id(), None);
        // Sender side dropped with the listener
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
