//! Reading whole protocol messages off a byte stream
//!
//! TCP delivers bytes, not messages, so incoming data is buffered until a
//! complete message decodes. Once part of a message has arrived, each further
//! read can be bounded by a timeout so a stalled peer cannot hold its reader
//! forever.

use crate::codec::{Decode, DecodeError};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] DecodeError),
    #[error("peer stalled in the middle of a message")]
    Timeout,
    #[error("connection closed in the middle of a message")]
    UnexpectedEof,
}

pub struct MessageReader<R> {
    inner: R,
    buffer: Vec<u8>,
    partial_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            partial_timeout: None,
        }
    }

    /// Bounds every read made while a message is only partially received.
    pub fn with_partial_timeout(mut self, limit: Duration) -> Self {
        self.partial_timeout = Some(limit);
        self
    }

    /// Reads the next complete message. `Ok(None)` is a clean end of stream
    /// on a message boundary.
    pub async fn read_message<M: Decode>(&mut self) -> Result<Option<M>, ReadError> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some((message, used)) = M::decode_prefix(&self.buffer)? {
                self.buffer.drain(..used);
                return Ok(Some(message));
            }

            let read = match self.partial_timeout {
                Some(limit) if !self.buffer.is_empty() => {
                    timeout(limit, self.inner.read(&mut chunk))
                        .await
                        .map_err(|_| ReadError::Timeout)??
                }
                _ => self.inner.read(&mut chunk).await?,
            };

            if read == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(ReadError::UnexpectedEof)
                };
            }

            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}
