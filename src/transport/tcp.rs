//! TCP transport for SMB2 direct-hosted connections (port 445)

use super::{StreamTransport, Transport, DEFAULT_WRITE_TIMEOUT};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Default SMB2 direct TCP port
pub const DEFAULT_PORT: u16 = 445;

/// TCP transport for the SMB2 client
pub struct TcpTransport {
    host: String,
    port: u16,
    write_timeout: Duration,
    inner: Option<StreamTransport<TcpStream>>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            inner: None,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Establish the TCP connection. Opening an already-open transport
    /// is a no-op.
    pub async fn open(&mut self) -> Result<()> {
        if self.inner.as_ref().is_some_and(|t| t.is_open()) {
            return Ok(());
        }
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        debug!(host = %self.host, port = self.port, "tcp transport connected");
        self.inner = Some(StreamTransport::with_write_timeout(
            stream,
            self.write_timeout,
        ));
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.write(data).await,
            None => Err(Error::StreamNotOpened),
        }
    }

    async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read_buf(buf).await,
            None => Err(Error::StreamNotOpened),
        }
    }

    fn is_open(&self) -> bool {
        self.inner.as_ref().is_some_and(|t| t.is_open())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_write_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut transport = TcpTransport::new(addr.ip().to_string(), addr.port());
        assert!(!transport.is_open());
        transport.open().await.unwrap();
        assert!(transport.is_open());
        // Re-opening is a no-op
        transport.open().await.unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        transport.write(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        transport.close().await.unwrap();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write(b"x").await,
            Err(Error::StreamNotOpened)
        ));
    }
}
