//! Machine-readable error kinds
//!
//! Every error type in voxroom maps onto one of these kinds so callers can
//! branch on the category (drop the payload, retry the send, fix the config)
//! without matching on each crate's error enum.

use std::fmt;

/// Category of a voxroom error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Inbound payload could not be decoded
    ///
    /// The payload should be dropped; nothing was forwarded.
    MalformedPayload,

    /// The underlying transport rejected or failed an operation
    Transport,

    /// Operation not valid in the adapter's current lifecycle or room state
    InvalidState,

    /// Settings could not be loaded, saved, or validated
    Config,
}

impl ErrorKind {
    /// String form used in logs and diagnostics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::Transport => "transport",
            Self::InvalidState => "invalid_state",
            Self::Config => "config",
        }
    }

    /// Parse from the string form
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "malformed_payload" => Some(Self::MalformedPayload),
            "transport" => Some(Self::Transport),
            "invalid_state" => Some(Self::InvalidState),
            "config" => Some(Self::Config),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str() {
        assert_eq!(ErrorKind::MalformedPayload.as_str(), "malformed_payload");
        assert_eq!(ErrorKind::Transport.as_str(), "transport");
        assert_eq!(ErrorKind::InvalidState.as_str(), "invalid_state");
        assert_eq!(ErrorKind::Config.as_str(), "config");
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            ErrorKind::parse("malformed_payload"),
            Some(ErrorKind::MalformedPayload)
        );
        assert_eq!(ErrorKind::parse("config"), Some(ErrorKind::Config));
        assert_eq!(ErrorKind::parse("unknown"), None);
        assert_eq!(ErrorKind::parse(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorKind::InvalidState), "invalid_state");
    }

    #[test]
    fn test_roundtrip() {
        for kind in [
            ErrorKind::MalformedPayload,
            ErrorKind::Transport,
            ErrorKind::InvalidState,
            ErrorKind::Config,
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
    }
}
