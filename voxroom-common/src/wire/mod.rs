//! Binary reader and writer for voxroom payloads
//!
//! All multi-byte values are **little-endian**. Arrays are written as an `i32`
//! element count followed by the elements, with no padding.
//!
//! The reader never indexes past the end of its slice: every read checks the
//! remaining length first and reports [`WireError::UnexpectedEnd`] instead.

mod reader;
mod writer;

use thiserror::Error;

pub use reader::WireReader;
pub use writer::WireWriter;

/// Size of an encoded `i32` in bytes
pub const I32_SIZE: usize = 4;

/// Size of an encoded `f32` in bytes
pub const F32_SIZE: usize = 4;

/// Errors produced while reading a wire payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// The payload ended before a value could be read
    #[error("unexpected end of payload: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// An array length prefix was negative
    #[error("negative array length {0}")]
    NegativeLength(i32),

    /// Bytes were left over after the last expected field
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}
