//! Frame codec for the lottery protocol
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +--------+----------------------+------------------+
//! | opcode | payload length (u32) | payload          |
//! | 1 byte | 4 bytes, big-endian  | `length` bytes   |
//! +--------+----------------------+------------------+
//! ```
//!
//! TCP has no message boundaries, so reads are always driven by a length
//! that was read first. Nothing in here scans payload bytes for delimiters.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{HEADER_SIZE, MAX_PAYLOAD_LEN};
use crate::errors::{FramingError, WriteError};
use crate::types::OperationCode;

/// Upper bound on the buffer reserved up front for a payload read.
const INITIAL_READ_CAPACITY: usize = 64 * 1024;

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: OperationCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: OperationCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    pub fn empty(opcode: OperationCode) -> Self {
        Self::new(opcode, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload interpreted as UTF-8 text.
    pub fn text(&self) -> Result<&str, FramingError> {
        Ok(std::str::from_utf8(&self.payload)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, FramingError> {
        encode(self.opcode, &self.payload)
    }
}

/// Build the wire bytes for one frame.
pub fn encode(opcode: OperationCode, payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let len = u32::try_from(payload.len()).map_err(|_| FramingError::Oversized {
        len: payload.len(),
        max: MAX_PAYLOAD_LEN,
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(opcode.as_u8());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Write every byte of `bytes`, resuming after short writes.
///
/// A write that accepts zero bytes means the peer is gone.
pub async fn write_all<W>(writer: &mut W, bytes: &[u8]) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total = bytes.len();
    let mut sent = 0;

    while sent < total {
        match writer.write(&bytes[sent..]).await {
            Ok(0) => return Err(WriteError::PeerClosed { sent, total }),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WriteError::Io(e)),
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Read exactly `n` bytes, failing if the stream ends first.
pub async fn read_exact<R>(reader: &mut R, n: usize) -> Result<Vec<u8>, FramingError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(n.min(INITIAL_READ_CAPACITY));
    let mut limited = (&mut *reader).take(n as u64);

    loop {
        match limited.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) if buf.len() == n => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(FramingError::Io(e)),
        }
    }

    if buf.len() < n {
        return Err(FramingError::Truncated {
            read: buf.len(),
            expected: n,
        });
    }
    Ok(buf)
}

/// Decode one frame, accepting any length the header can express.
pub async fn decode<R>(reader: &mut R) -> Result<Frame, FramingError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    decode_with_limit(reader, MAX_PAYLOAD_LEN).await
}

/// Decode one frame, rejecting payloads longer than `max_len` before reading them.
pub async fn decode_with_limit<R>(reader: &mut R, max_len: usize) -> Result<Frame, FramingError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let header = read_exact(reader, HEADER_SIZE).await?;
    let opcode = OperationCode::try_from(header[0])?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    if len > max_len {
        return Err(FramingError::Oversized { len, max: max_len });
    }

    if len == 0 {
        return Ok(Frame::empty(opcode));
    }

    let payload = read_exact(reader, len).await?;
    tracing::trace!(opcode = %opcode, len, "Frame decoded");

    Ok(Frame { opcode, payload })
}
