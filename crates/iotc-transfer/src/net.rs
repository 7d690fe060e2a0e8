//! Plain TCP [`Transport`] on top of an embassy-net stack.
//!
//! Useful against local test servers and as the socket layer a TLS transport
//! wraps. Trust anchors are ignored here.

use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack, dns::DnsQueryType};
use embassy_time::with_timeout;
use embedded_io_async::Write as _;
use log::{debug, warn};

use crate::error::TransportError;
use crate::transport::{ConnectParams, Transport};

/// Resolve a host name or IPv4 literal.
pub async fn resolve_host(stack: Stack<'_>, host: &str) -> Result<IpAddress, TransportError> {
    if let Ok(ip) = host.parse::<embassy_net::Ipv4Address>() {
        return Ok(IpAddress::Ipv4(ip));
    }

    let Ok(addresses) = stack.dns_query(host, DnsQueryType::A).await else {
        warn!("transport: dns query for {} failed", host);
        return Err(TransportError::Network);
    };

    addresses.first().copied().ok_or(TransportError::Network)
}

pub struct TcpTransport<'a> {
    stack: Stack<'a>,
    socket: TcpSocket<'a>,
}

impl<'a> TcpTransport<'a> {
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8]) -> Self {
        Self {
            stack,
            socket: TcpSocket::new(stack, rx_buffer, tx_buffer),
        }
    }
}

impl Transport for TcpTransport<'_> {
    async fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), TransportError> {
        if !params.trust_anchors.is_empty() {
            warn!("transport: plain tcp ignores {} trust anchors", params.trust_anchors.len());
        }
        let address = resolve_host(self.stack, params.host).await?;
        debug!("transport: {} resolved to {}", params.host, address);

        self.socket.set_timeout(Some(params.read_timeout));
        match with_timeout(params.connect_timeout, self.socket.connect((address, params.port)))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("transport: connect error: {:?}", e);
                self.socket.abort();
                Err(TransportError::Network)
            }
            Err(_) => {
                warn!("transport: connect timed out");
                self.socket.abort();
                Err(TransportError::Network)
            }
        }
    }

    async fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.socket
            .write_all(buf)
            .await
            .map_err(|_| TransportError::Network)?;
        self.socket.flush().await.map_err(|_| TransportError::Network)?;
        Ok(buf.len())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.socket.read(buf).await.map_err(|_| TransportError::Network)
    }

    async fn disconnect(&mut self) {
        // Abort rather than close so the socket is immediately reusable.
        self.socket.abort();
        let _ = self.socket.flush().await;
    }
}
