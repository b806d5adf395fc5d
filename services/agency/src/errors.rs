use protocol::{ErrorKind, FramingError, OperationCode, WriteError};

use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("write error: {0}")]
    Io(#[from] WriteError),

    #[error("expected {expected}, received {received}: {detail}")]
    Protocol {
        expected: &'static str,
        received: OperationCode,
        detail: String,
    },

    #[error("bet source error: {0}")]
    Source(#[from] SourceError),

    #[error("interrupted by shutdown")]
    Interrupted,

    #[error("no results after {attempts} poll attempts")]
    PollExhausted { attempts: u32 },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Connection { .. } => ErrorKind::Connection,
            ClientError::Framing(_) => ErrorKind::Framing,
            ClientError::Io(_) => ErrorKind::Io,
            ClientError::Protocol { .. } => ErrorKind::Protocol,
            ClientError::Source(_) => ErrorKind::Source,
            ClientError::Interrupted => ErrorKind::Shutdown,
            ClientError::PollExhausted { .. } => ErrorKind::Exhausted,
        }
    }

    /// Build a protocol error for a frame the current state does not accept.
    pub fn unexpected(expected: &'static str, received: OperationCode, payload: &[u8]) -> Self {
        ClientError::Protocol {
            expected,
            received,
            detail: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = ClientError::Framing(FramingError::Closed);
        assert_eq!(err.kind(), ErrorKind::Framing);

        let err = ClientError::Io(WriteError::PeerClosed { sent: 0, total: 5 });
        assert_eq!(err.kind(), ErrorKind::Io);

        assert_eq!(ClientError::Interrupted.kind(), ErrorKind::Shutdown);
        assert_eq!(
            ClientError::PollExhausted { attempts: 3 }.kind(),
            ErrorKind::Exhausted
        );
    }

    #[test]
    fn test_unexpected_carries_payload_text() {
        let err = ClientError::unexpected("CONFIRMATION", OperationCode::Error, b"bad batch");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(
            err.to_string(),
            "expected CONFIRMATION, received ERROR: bad batch"
        );
    }
}
