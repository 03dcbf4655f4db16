//! Little-endian payload writer

use super::{F32_SIZE, I32_SIZE};

/// Appends little-endian values to an owned byte buffer
#[derive(Debug, Default)]
pub struct WireWriter {
    bytes: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Create a writer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Write a 4-byte signed integer
    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a 4-byte IEEE-754 float (bit pattern preserved, including NaN payloads)
    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length-prefixed float array
    ///
    /// The prefix is the element count as an `i32`. Callers must keep
    /// `values.len()` within `i32::MAX`; this is only checked in debug builds.
    pub fn write_f32_array(&mut self, values: &[f32]) {
        debug_assert!(
            i32::try_from(values.len()).is_ok(),
            "array of {} elements does not fit an i32 length prefix",
            values.len()
        );

        self.bytes.reserve(I32_SIZE + values.len() * F32_SIZE);
        self.write_i32(values.len() as i32);
        for value in values {
            self.write_f32(*value);
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the writer and return the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
