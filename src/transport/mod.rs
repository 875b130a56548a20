//! Transport layer for the SMB2 client
//!
//! Tokio-based async byte transports. The protocol layer never touches
//! sockets; it hands serialized frames to a [`Transport`] and pulls raw
//! bytes back out, so tests can substitute an in-memory stream.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub mod tcp;

pub use tcp::TcpTransport;

/// Default per-write timeout
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for SMB2 transport implementations
#[async_trait]
pub trait Transport: Send {
    /// Write a complete buffer to the remote endpoint, returning the
    /// number of bytes written
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read whatever bytes are available into `buf`, returning how many
    /// were appended
    async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize>;

    /// Whether the underlying stream is open
    fn is_open(&self) -> bool;

    /// Close the connection. Closing an already-closed transport is a
    /// no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Transport over any async byte stream.
///
/// Wraps the stream with the open/closed bookkeeping and write timeout
/// the client expects. [`TcpTransport`] builds on this; tests drive it
/// with `tokio::io::duplex` pipes.
pub struct StreamTransport<S> {
    stream: Option<S>,
    write_timeout: Duration,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(stream: S, write_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            write_timeout,
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::StreamNotOpened)?;
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await?;
            Ok::<_, Error>(())
        };
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(result) => result.map(|_| data.len()),
            Err(_) => Err(Error::TimedOut),
        }
    }

    async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::StreamNotOpened)?;
        let n = stream.read_buf(buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(n)
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}
