//! Secured connection seam and the session wrapper around it.
//!
//! The TLS stack is board specific, so the engine only sees a [`Transport`]:
//! something that can connect to a host, move bytes and be torn down. A
//! [`TransportSession`] keeps the connection parameters so the downloader can
//! reconnect to the same endpoint after a link failure.

use embassy_time::Duration;
use log::{debug, info, warn};

use crate::error::{Error, TransferResult, TransportError};

/// PEM encoded root certificate.
#[derive(Debug, Clone, Copy)]
pub struct TrustAnchor<'a>(pub &'a str);

/// Parameters needed to (re)establish a connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub trust_anchors: &'a [TrustAnchor<'a>],
}

impl<'a> ConnectParams<'a> {
    pub const fn new(host: &'a str, port: u16) -> Self {
        Self {
            host,
            port,
            connect_timeout: Duration::from_millis(10_000),
            read_timeout: Duration::from_millis(10_000),
            trust_anchors: &[],
        }
    }

    /// Set connect and read timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Set the root certificates the server chain is checked against.
    #[must_use]
    pub const fn with_trust_anchors(mut self, anchors: &'a [TrustAnchor<'a>]) -> Self {
        self.trust_anchors = anchors;
        self
    }
}

/// A stream transport, usually TLS over TCP.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a connection to `params.host:params.port`.
    async fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), TransportError>;

    /// Send bytes, returning how many were accepted.
    async fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Receive into `buf`, returning how many bytes were read. `0` means the
    /// peer closed the connection.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Release the socket and TLS state.
    async fn disconnect(&mut self);
}

impl<T: Transport> Transport for &mut T {
    async fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), TransportError> {
        (**self).connect(params).await
    }

    async fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        (**self).send(buf).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).recv(buf).await
    }

    async fn disconnect(&mut self) {
        (**self).disconnect().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// One connection to one endpoint.
pub struct TransportSession<'a, T: Transport> {
    transport: T,
    params: ConnectParams<'a>,
    state: SessionState,
}

impl<'a, T: Transport> TransportSession<'a, T> {
    /// Connect `transport` and wrap it in a session.
    pub async fn connect(mut transport: T, params: ConnectParams<'a>) -> TransferResult<Self> {
        info!("transport: connecting to {}:{}", params.host, params.port);
        transport.connect(&params).await.map_err(|e| {
            warn!("transport: connect to {} failed: {:?}", params.host, e);
            Error::from(e)
        })?;
        info!("transport: connected to {}", params.host);

        Ok(Self {
            transport,
            params,
            state: SessionState::Connected,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &ConnectParams<'a> {
        &self.params
    }

    /// Tear down the connection.
    ///
    /// Calling this on a disconnected session only logs a warning.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            warn!("transport: {} already disconnected", self.params.host);
            return;
        }
        self.transport.disconnect().await;
        self.state = SessionState::Disconnected;
        info!("transport: disconnected from {}", self.params.host);
    }

    /// Disconnect and connect again with the stored parameters.
    pub async fn reconnect(&mut self) -> TransferResult {
        self.disconnect().await;
        info!("transport: reconnecting to {}:{}", self.params.host, self.params.port);
        self.transport.connect(&self.params).await.map_err(|e| {
            warn!("transport: reconnect to {} failed: {:?}", self.params.host, e);
            Error::from(e)
        })?;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Send the whole buffer.
    pub async fn send_all(&mut self, mut buf: &[u8]) -> TransferResult {
        if self.state != SessionState::Connected {
            return Err(TransportError::NotConnected.into());
        }
        while !buf.is_empty() {
            let n = self.transport.send(buf).await?;
            if n == 0 {
                debug!("transport: send accepted no bytes");
                return Err(Error::Network);
            }
            buf = buf.get(n..).ok_or_else(|| {
                warn!("transport: send reported {} bytes for a {} byte buffer", n, buf.len());
                Error::Network
            })?;
        }
        Ok(())
    }

    /// Receive some bytes into `buf`.
    pub async fn recv(&mut self, buf: &mut [u8]) -> TransferResult<usize> {
        if self.state != SessionState::Connected {
            return Err(TransportError::NotConnected.into());
        }
        Ok(self.transport.recv(buf).await?)
    }

    /// Give the transport back, disconnecting first if needed.
    pub async fn close(mut self) -> T {
        if self.state == SessionState::Connected {
            self.disconnect().await;
        }
        self.transport
    }
}
