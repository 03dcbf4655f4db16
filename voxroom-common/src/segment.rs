//! Audio segment wire format
//!
//! An audio segment is one chunk of captured audio sent as a single custom
//! event payload. Segments are produced by the sender, decoded by each
//! receiver, and handed on to playback; nothing here keeps state between calls.
//!
//! Wire format (binary, little-endian, no padding):
//! ```text
//! +-------------------+-------------------+-------------------+
//! | sequence_index(4) | sample_rate_hz(4) | channel_count(4)  |
//! +-------------------+-------------------+-------------------+
//! | sample_count (4)  |      samples (4 * sample_count)       |
//! +-------------------+---------------------------------------+
//! ```
//! All integers are `i32`; samples are IEEE-754 `f32`. Multi-channel audio
//! is interleaved and the sample count is not checked against the channel
//! count.

use std::time::Duration;

use thiserror::Error;

use crate::error_kind::ErrorKind;
use crate::wire::{F32_SIZE, I32_SIZE, WireError, WireReader, WireWriter};

/// Fixed header size (sequence index + sample rate + channel count)
pub const SEGMENT_HEADER_SIZE: usize = 3 * I32_SIZE;

/// Smallest valid payload: the fixed header plus the sample count prefix
pub const MIN_SEGMENT_PAYLOAD_SIZE: usize = SEGMENT_HEADER_SIZE + I32_SIZE;

/// Error returned when an inbound payload cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Payload is too short, declares more samples than it carries,
    /// or has bytes left over
    #[error("malformed audio segment payload: {0}")]
    MalformedPayload(#[from] WireError),
}

impl CodecError {
    /// Machine-readable kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedPayload(_) => ErrorKind::MalformedPayload,
        }
    }
}

/// One chunk of audio plus the metadata needed to play it back
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    sequence_index: i32,
    sample_rate_hz: i32,
    channel_count: i32,
    samples: Vec<f32>,
}

impl AudioSegment {
    /// Create a segment
    ///
    /// `samples` are interleaved when `channel_count > 1`.
    pub fn new(
        sequence_index: i32,
        sample_rate_hz: i32,
        channel_count: i32,
        samples: Vec<f32>,
    ) -> Self {
        Self {
            sequence_index,
            sample_rate_hz,
            channel_count,
            samples,
        }
    }

    /// Sender-assigned position in the outgoing stream
    pub fn sequence_index(&self) -> i32 {
        self.sequence_index
    }

    /// Sample rate of the source in Hz
    pub fn sample_rate_hz(&self) -> i32 {
        self.sample_rate_hz
    }

    /// Number of interleaved channels
    pub fn channel_count(&self) -> i32 {
        self.channel_count
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Take ownership of the sample buffer
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of frames (samples per channel), rounding down
    ///
    /// Returns 0 when the channel count is not positive.
    pub fn frame_count(&self) -> usize {
        match usize::try_from(self.channel_count) {
            Ok(channels) if channels > 0 => self.samples.len() / channels,
            _ => 0,
        }
    }

    /// Playback duration, or `None` if the sample rate is not positive
    pub fn duration(&self) -> Option<Duration> {
        let rate = u32::try_from(self.sample_rate_hz).ok().filter(|r| *r > 0)?;
        Some(Duration::from_secs_f64(
            self.frame_count() as f64 / f64::from(rate),
        ))
    }

    /// Exact size of this segment on the wire
    pub fn encoded_len(&self) -> usize {
        MIN_SEGMENT_PAYLOAD_SIZE + self.samples.len() * F32_SIZE
    }

    /// Compare two segments including the raw bit patterns of the samples
    ///
    /// Unlike `==`, this treats identical NaN payloads as equal.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.sequence_index == other.sequence_index
            && self.sample_rate_hz == other.sample_rate_hz
            && self.channel_count == other.channel_count
            && self.samples.len() == other.samples.len()
            && self
                .samples
                .iter()
                .zip(&other.samples)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Serialize the segment for transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_audio_segment(self)
    }

    /// Deserialize a segment received from a peer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        decode_audio_segment(bytes)
    }
}

/// Encode a segment into its wire representation
///
/// The output is always exactly [`AudioSegment::encoded_len`] bytes.
/// `segment.samples().len()` must fit in an `i32` (checked in debug builds only).
pub fn encode_audio_segment(segment: &AudioSegment) -> Vec<u8> {
    let mut writer = WireWriter::with_capacity(segment.encoded_len());

    writer.write_i32(segment.sequence_index);
    writer.write_i32(segment.sample_rate_hz);
    writer.write_i32(segment.channel_count);
    writer.write_f32_array(&segment.samples);

    writer.into_bytes()
}

/// Decode a segment from its wire representation
///
/// # Errors
///
/// Returns [`CodecError::MalformedPayload`] if the buffer is shorter than the
/// header, the sample count is negative or runs past the end of the buffer,
/// or bytes remain after the last sample.
pub fn decode_audio_segment(bytes: &[u8]) -> Result<AudioSegment, CodecError> {
    let mut reader = WireReader::new(bytes);

    let sequence_index = reader.read_i32()?;
    let sample_rate_hz = reader.read_i32()?;
    let channel_count = reader.read_i32()?;
    let samples = reader.read_f32_array()?;
    reader.finish()?;

    Ok(AudioSegment {
        sequence_index,
        sample_rate_hz,
        channel_count,
        samples,
    })
}
