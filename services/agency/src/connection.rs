//! Connection lifecycle
//!
//! The session owns a root cancellation token. Every connection holds a child
//! of it and races each socket operation against that child, so cancelling
//! the root unblocks whatever read or write is in flight and drops the socket.

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use protocol::{codec, Frame, FramingError, OperationCode};

use crate::errors::{ClientError, Result};

/// Cloneable handle that requests shutdown of a session.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Flip the running flag and close any live connection. Idempotent.
    pub fn request_shutdown(&self) {
        if !self.token.is_cancelled() {
            tracing::info!(action = "shutdown", result = "in_progress", "Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Opens outbound connections that can be interrupted by shutdown.
#[derive(Debug)]
pub struct Lifecycle {
    shutdown: CancellationToken,
    connect_timeout: Duration,
    max_payload_bytes: usize,
}

impl Lifecycle {
    pub fn new(connect_timeout: Duration, max_payload_bytes: usize) -> Self {
        Self {
            shutdown: CancellationToken::new(),
            connect_timeout,
            max_payload_bytes,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    pub fn request_shutdown(&self) {
        self.shutdown_handle().request_shutdown();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Resolves once shutdown has been requested.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await
    }

    /// Connect to `address`, giving up on shutdown or after the connect timeout.
    pub async fn open(&self, address: &str) -> Result<Connection> {
        if !self.is_running() {
            return Err(ClientError::Interrupted);
        }

        let connect = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address));
        let stream = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ClientError::Interrupted),
            res = connect => match res {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    return Err(ClientError::Connection { address: address.to_string(), source })
                }
                Err(_) => {
                    return Err(ClientError::Connection {
                        address: address.to_string(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("no answer within {:?}", self.connect_timeout),
                        ),
                    })
                }
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not disable Nagle on agency socket");
        }
        tracing::debug!(address = %address, "Connected to server");

        Ok(Connection {
            stream: Some(stream),
            address: address.to_string(),
            cancel: self.shutdown.child_token(),
            max_payload_bytes: self.max_payload_bytes,
        })
    }
}

/// One open connection to the lottery server.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    address: String,
    cancel: CancellationToken,
    max_payload_bytes: usize,
}

impl Connection {
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Encode and write one frame.
    pub async fn send(&mut self, opcode: OperationCode, payload: &[u8]) -> Result<()> {
        let bytes = codec::encode(opcode, payload)?;
        let cancel = self.cancel.clone();
        let Some(stream) = self.stream.as_mut() else {
            return Err(FramingError::Closed.into());
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = codec::write_all(stream, &bytes) => Some(res),
        };

        match outcome {
            Some(res) => {
                res?;
                tracing::debug!(
                    address = %self.address,
                    opcode = %opcode,
                    len = payload.len(),
                    "Frame sent"
                );
                Ok(())
            }
            None => {
                self.stream = None;
                Err(ClientError::Interrupted)
            }
        }
    }

    /// Read one frame. Fails up front if the connection was already closed.
    pub async fn receive(&mut self) -> Result<Frame> {
        let cancel = self.cancel.clone();
        let max = self.max_payload_bytes;
        let Some(stream) = self.stream.as_mut() else {
            return Err(FramingError::Closed.into());
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = codec::decode_with_limit(stream, max) => Some(res),
        };

        match outcome {
            Some(res) => {
                let frame = res?;
                tracing::debug!(
                    address = %self.address,
                    opcode = %frame.opcode,
                    len = frame.len(),
                    "Frame received"
                );
                Ok(frame)
            }
            None => {
                self.stream = None;
                Err(ClientError::Interrupted)
            }
        }
    }

    /// Shut down the write side and drop the socket. Safe to call twice.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::trace!(error = %e, "Socket shutdown failed");
            }
        }
    }
}
