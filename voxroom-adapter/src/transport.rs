//! Transport seam
//!
//! The multiplayer SDK binding implements [`Transport`] for outbound calls and
//! feeds [`TransportEvent`]s into [`ChatroomNetwork::handle`] from whatever
//! thread it delivers callbacks on.
//!
//! [`ChatroomNetwork::handle`]: crate::network::ChatroomNetwork::handle

use thiserror::Error;
use voxroom_common::{DeliveryMode, ErrorKind, PeerId, SendTarget};

/// Room callbacks in the transport's own vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCallback {
    /// The local participant is now in `room`
    ///
    /// `present` lists the other participants already in the room.
    JoinedRoom {
        room: String,
        local: PeerId,
        is_host: bool,
        present: Vec<PeerId>,
    },
    /// The local participant left its room
    LeftRoom,
    /// A remote participant entered the room
    PlayerEntered(PeerId),
    /// A remote participant left the room
    PlayerLeft(PeerId),
    /// Room hosting moved to another participant
    HostChanged(PeerId),
    /// A create request was refused
    CreateRoomFailed { code: i16, message: String },
    /// A join request was refused
    JoinRoomFailed { code: i16, message: String },
}

/// Anything the transport delivers to the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Room membership callback
    Room(RoomCallback),
    /// Custom event raised by a participant
    Custom {
        tag: u8,
        sender: PeerId,
        payload: Vec<u8>,
    },
}

/// Error reported by a transport operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport cannot take requests right now (disconnected, busy)
    #[error("transport not ready: {0}")]
    NotReady(String),

    /// The operation needs a room and the local participant is not in one
    #[error("not in a room")]
    NotInRoom,

    /// The payload could not be handed to the network
    #[error("send failed: {0}")]
    SendFailed(String),
}

impl TransportError {
    /// Machine-readable kind for this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

/// Outbound side of a room-based multiplayer transport
///
/// Room requests only ask the transport to act; the outcome arrives later as
/// a [`RoomCallback`].
pub trait Transport: Send + Sync {
    /// Raise a custom event carrying `payload`, tagged with `tag`
    fn raise_event(
        &self,
        tag: u8,
        payload: &[u8],
        target: SendTarget,
        delivery: DeliveryMode,
    ) -> Result<(), TransportError>;

    /// Ask to create (and host) a room
    fn create_room(&self, room: &str) -> Result<(), TransportError>;

    /// Ask to join an existing room
    fn join_room(&self, room: &str) -> Result<(), TransportError>;

    /// Ask to leave the current room
    fn leave_room(&self) -> Result<(), TransportError>;
}
