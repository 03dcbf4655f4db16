//! Bounds-checked little-endian payload reader

use super::{F32_SIZE, WireError};

/// Reads little-endian values from a borrowed byte slice
///
/// The cursor only advances on successful reads, so a failed read leaves the
/// reader where it was.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Current offset from the start of the payload
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Read a 4-byte signed integer
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.take_array().map(i32::from_le_bytes)
    }

    /// Read a 4-byte IEEE-754 float
    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        self.take_array().map(f32::from_le_bytes)
    }

    /// Read a length-prefixed float array
    ///
    /// The declared length is checked against the remaining bytes before
    /// anything is allocated. On failure the cursor is left before the prefix.
    pub fn read_f32_array(&mut self) -> Result<Vec<f32>, WireError> {
        let start = self.position;
        let declared = self.read_i32()?;

        let count = match usize::try_from(declared) {
            Ok(count) => count,
            Err(_) => {
                self.position = start;
                return Err(WireError::NegativeLength(declared));
            }
        };

        let needed = count.saturating_mul(F32_SIZE);
        if needed > self.remaining() {
            let remaining = self.remaining();
            self.position = start;
            return Err(WireError::UnexpectedEnd { needed, remaining });
        }

        let body = &self.bytes[self.position..self.position + needed];
        self.position += needed;

        Ok(body
            .chunks_exact(F32_SIZE)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Require that the whole payload has been consumed
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(WireError::TrailingBytes(extra)),
        }
    }

    fn take_array(&mut self) -> Result<[u8; 4], WireError> {
        let remaining = self.remaining();
        if remaining < 4 {
            return Err(WireError::UnexpectedEnd {
                needed: 4,
                remaining,
            });
        }

        let mut out = [0u8; 4];
        out.copy_from_slice(&self.bytes[self.position..self.position + 4]);
        self.position += 4;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireWriter;

    #[test]
    fn test_read_i32() {
        let mut reader = WireReader::new(&[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(reader.read_i32(), Ok(0x0102_0304));
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_read_i32_short() {
        let mut reader = WireReader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(
            reader.read_i32(),
            Err(WireError::UnexpectedEnd {
                needed: 4,
                remaining: 3
            })
        );
        // Cursor untouched
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_f32_array() {
        let mut writer = WireWriter::new();
        writer.write_f32_array(&[0.5, -0.25, 8.0]);
        let bytes = writer.into_bytes();

        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_f32_array(), Ok(vec![0.5, -0.25, 8.0]));
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_read_f32_array_negative_length() {
        let bytes = (-3i32).to_le_bytes();
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_f32_array(), Err(WireError::NegativeLength(-3)));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_f32_array_declared_too_long() {
        let mut bytes = 3i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());

        let mut reader = WireReader::new(&bytes);
        assert_eq!(
            reader.read_f32_array(),
            Err(WireError::UnexpectedEnd {
                needed: 12,
                remaining: 4
            })
        );
    }

    #[test]
    fn test_read_f32_array_huge_length_does_not_allocate() {
        let bytes = i32::MAX.to_le_bytes();
        let mut reader = WireReader::new(&bytes);
        assert!(matches!(
            reader.read_f32_array(),
            Err(WireError::UnexpectedEnd { remaining: 0, .. })
        ));
    }

    #[test]
    fn test_finish_reports_trailing_bytes() {
        let bytes = [0u8; 6];
        let mut reader = WireReader::new(&bytes);
        reader.read_i32().expect("four bytes available");
        assert_eq!(reader.finish(), Err(WireError::TrailingBytes(2)));
    }
}
