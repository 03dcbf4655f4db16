//! voxroom Common Library
//!
//! Wire format, chatroom vocabulary, and shared constants for voxroom.
//! Everything here is synchronous and free of I/O so it can be called from
//! whatever thread a transport delivers on.

mod error_kind;
pub mod chatroom;
pub mod segment;
pub mod sequence;
pub mod wire;

pub use chatroom::{ChatroomEvent, ChatroomEventKind, DeliveryMode, PeerId, SendTarget};
pub use error_kind::ErrorKind;
pub use segment::{AudioSegment, CodecError, decode_audio_segment, encode_audio_segment};
pub use sequence::{SequenceCheck, SequenceTracker};

/// Default application-level event code for audio segments
pub const DEFAULT_AUDIO_EVENT_TAG: u8 = 1;

/// First event code reserved by the transport itself
///
/// Application payloads must use codes below this value.
pub const RESERVED_EVENT_TAG_START: u8 = 200;

/// Check whether an event code is available to applications
pub fn is_application_event_tag(tag: u8) -> bool {
    tag < RESERVED_EVENT_TAG_START
}
