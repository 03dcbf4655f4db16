//! Adapter error type

use thiserror::Error;
use voxroom_common::{CodecError, ErrorKind};

use crate::transport::TransportError;

/// Errors returned by [`ChatroomNetwork`](crate::network::ChatroomNetwork) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// `start()` has not been called yet
    #[error("chatroom network not started")]
    NotStarted,

    /// The network was disposed and cannot be used again
    #[error("chatroom network disposed")]
    Disposed,

    /// The operation needs an active chatroom
    #[error("not in a chatroom")]
    NotInRoom,

    /// The transport refused or failed the operation
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An inbound audio payload could not be decoded and was dropped
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl AdapterError {
    /// Machine-readable kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotStarted | Self::Disposed | Self::NotInRoom => ErrorKind::InvalidState,
            Self::Transport(e) => e.kind(),
            Self::Codec(e) => e.kind(),
        }
    }
}
