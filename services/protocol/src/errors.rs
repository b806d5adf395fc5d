/// Error types for the lottery wire protocol
///
/// Codec failures are split by direction:
/// - `FramingError` for anything that goes wrong while reading a frame
/// - `WriteError` for a frame that could not be fully written
///
/// `ErrorKind` is the closed classification the agency uses to branch on
/// failures (logging level, process exit status) without matching on
/// message text.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while decoding a frame from a stream.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    Oversized { len: usize, max: usize },

    #[error("stream ended after {read} of {expected} bytes")]
    Truncated { read: usize, expected: usize },

    #[error("unknown operation code {0}")]
    UnknownOpcode(u8),

    #[error("connection is closed")]
    Closed,

    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("read failed: {0}")]
    Io(#[source] std::io::Error),
}

/// Failures while writing a frame to a stream.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("peer closed the connection after {sent} of {total} bytes")]
    PeerClosed { sent: usize, total: usize },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while parsing payload text into domain values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("bet record has {found} fields (expected {expected})")]
    FieldCount { found: usize, expected: usize },
}

/// Error classification shared across the agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Outbound connection could not be established
    Connection,

    /// Malformed, truncated or oversized frame, or a read on a closed connection
    Framing,

    /// A write could not complete
    Io,

    /// The peer answered with an opcode the current state does not accept
    Protocol,

    /// The bet record source failed
    Source,

    /// The operation was interrupted by a shutdown request
    Shutdown,

    /// Result polling gave up after its configured number of attempts
    Exhausted,
}

impl ErrorKind {
    /// Process exit status for a run that aborted with this kind of error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Shutdown => 0,
            ErrorKind::Connection => 2,
            ErrorKind::Framing => 3,
            ErrorKind::Io => 4,
            ErrorKind::Protocol => 5,
            ErrorKind::Source => 6,
            ErrorKind::Exhausted => 7,
        }
    }

    /// Log level used when reporting a failure of this kind.
    pub fn log_level(&self) -> tracing::Level {
        match self {
            ErrorKind::Shutdown => tracing::Level::INFO,
            ErrorKind::Exhausted => tracing::Level::WARN,
            _ => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Connection => "CONNECTION",
            ErrorKind::Framing => "FRAMING",
            ErrorKind::Io => "IO",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Source => "SOURCE",
            ErrorKind::Shutdown => "SHUTDOWN",
            ErrorKind::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_for_failures() {
        let kinds = [
            ErrorKind::Connection,
            ErrorKind::Framing,
            ErrorKind::Io,
            ErrorKind::Protocol,
            ErrorKind::Source,
            ErrorKind::Exhausted,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert_eq!(ErrorKind::Shutdown.exit_code(), 0);
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(ErrorKind::Shutdown.log_level(), tracing::Level::INFO);
        assert_eq!(ErrorKind::Exhausted.log_level(), tracing::Level::WARN);
        assert_eq!(ErrorKind::Protocol.log_level(), tracing::Level::ERROR);
        assert_eq!(ErrorKind::Connection.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_truncated_display() {
        let error = FramingError::Truncated { read: 2, expected: 5 };
        assert_eq!(error.to_string(), "stream ended after 2 of 5 bytes");
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::Protocol).unwrap();
        assert_eq!(json, "\"PROTOCOL\"");
        assert_eq!(ErrorKind::Protocol.to_string(), "PROTOCOL");
    }
}
