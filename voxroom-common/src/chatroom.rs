//! Generic chatroom vocabulary
//!
//! These are the names the rest of a voice-chat stack sees, independent of
//! which multiplayer SDK carries the audio. A chatroom maps 1:1 onto a room of
//! the underlying transport and a peer onto one of its participants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::segment::AudioSegment;

/// Participant identifier within a chatroom
///
/// Mirrors the transport's per-room participant number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub i32);

impl PeerId {
    /// Raw participant number
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for PeerId {
    fn from(id: i32) -> Self {
        PeerId(id)
    }
}

/// Who an outgoing payload is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendTarget {
    /// A single peer
    Peer(PeerId),
    /// Every peer in the room except the sender
    Others,
}

impl fmt::Display for SendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTarget::Peer(id) => write!(f, "peer {}", id),
            SendTarget::Others => f.write_str("all peers"),
        }
    }
}

/// Delivery guarantee requested from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Fire and forget; late audio is worse than lost audio
    #[default]
    Unreliable,
    /// Resent until acknowledged, in order
    Reliable,
}

impl DeliveryMode {
    /// Whether the transport should resend until acknowledged
    pub fn is_reliable(self) -> bool {
        self == DeliveryMode::Reliable
    }
}

/// Notification emitted by a chatroom network
#[derive(Debug, Clone, PartialEq)]
pub enum ChatroomEvent {
    /// The local peer created and now hosts a chatroom
    Created { room: String },
    /// Creating a chatroom failed
    CreationFailed { reason: String },
    /// The hosted chatroom was closed
    Closed,
    /// The local peer joined someone else's chatroom
    Joined { room: String, local: PeerId },
    /// Joining a chatroom failed
    JoinFailed { reason: String },
    /// The local peer left a chatroom it did not host
    Left,
    /// A remote peer joined the current chatroom
    PeerJoined(PeerId),
    /// A remote peer left the current chatroom
    PeerLeft(PeerId),
    /// Audio arrived from a remote peer
    AudioReceived { peer: PeerId, segment: AudioSegment },
    /// Audio was handed to the transport
    AudioSent { target: SendTarget, segment: AudioSegment },
}

impl ChatroomEvent {
    /// The notification channel this event is delivered on
    pub fn kind(&self) -> ChatroomEventKind {
        match self {
            ChatroomEvent::Created { .. } => ChatroomEventKind::Created,
            ChatroomEvent::CreationFailed { .. } => ChatroomEventKind::CreationFailed,
            ChatroomEvent::Closed => ChatroomEventKind::Closed,
            ChatroomEvent::Joined { .. } => ChatroomEventKind::Joined,
            ChatroomEvent::JoinFailed { .. } => ChatroomEventKind::JoinFailed,
            ChatroomEvent::Left => ChatroomEventKind::Left,
            ChatroomEvent::PeerJoined(_) => ChatroomEventKind::PeerJoined,
            ChatroomEvent::PeerLeft(_) => ChatroomEventKind::PeerLeft,
            ChatroomEvent::AudioReceived { .. } => ChatroomEventKind::AudioReceived,
            ChatroomEvent::AudioSent { .. } => ChatroomEventKind::AudioSent,
        }
    }
}

/// Named notification channels, one per chatroom transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatroomEventKind {
    Created,
    CreationFailed,
    Closed,
    Joined,
    JoinFailed,
    Left,
    PeerJoined,
    PeerLeft,
    AudioReceived,
    AudioSent,
}

impl ChatroomEventKind {
    /// Get all event kinds
    pub fn all() -> &'static [ChatroomEventKind] {
        &[
            ChatroomEventKind::Created,
            ChatroomEventKind::CreationFailed,
            ChatroomEventKind::Closed,
            ChatroomEventKind::Joined,
            ChatroomEventKind::JoinFailed,
            ChatroomEventKind::Left,
            ChatroomEventKind::PeerJoined,
            ChatroomEventKind::PeerLeft,
            ChatroomEventKind::AudioReceived,
            ChatroomEventKind::AudioSent,
        ]
    }

    /// Whether this kind describes membership rather than audio traffic
    pub fn is_membership(self) -> bool {
        !matches!(
            self,
            ChatroomEventKind::AudioReceived | ChatroomEventKind::AudioSent
        )
    }
}
