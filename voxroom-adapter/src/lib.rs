//! voxroom Network Adapter
//!
//! Binds the generic chatroom vocabulary from `voxroom-common` to a room-based
//! multiplayer transport.
//!
//! ## Architecture
//!
//! - **ChatroomNetwork**: lifecycle, membership mapping, audio send/receive
//! - **Transport**: the seam a multiplayer SDK binding implements
//! - **EventHub**: synchronous listener fan-out, one channel per event kind
//! - **LoopbackHub**: in-process transport for tests and local demos

pub mod error;
pub mod events;
pub mod loopback;
pub mod network;
pub mod settings;
pub mod transport;

pub use error::AdapterError;
pub use events::{EventHub, ListenerId};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use network::{ChatroomNetwork, Phase};
pub use settings::{NetworkSettings, SettingsError};
pub use transport::{RoomCallback, Transport, TransportError, TransportEvent};
