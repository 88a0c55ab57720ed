//! Abstract datagram transport for NetUMP.
//!
//! The [`Transport`] trait lets the endpoint run over any async datagram
//! transport, not just UDP — a loopback pair in tests, or a tunnelled socket.
//! The built-in [`UdpTransport`] wraps `tokio::net::UdpSocket`.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

/// Boxed future returned by [`Transport::send_to`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = io::Result<usize>> + Send + 'a>>;

/// Boxed future returned by [`Transport::recv_from`].
pub type RecvFuture<'a> =
    Pin<Box<dyn Future<Output = io::Result<(usize, SocketAddr)>> + Send + 'a>>;

/// Async datagram transport used by
/// [`NetUmpEndpoint`](crate::endpoint::NetUmpEndpoint).
///
/// Implementors must provide send/receive operations addressed by
/// `SocketAddr`. The trait is object-safe so it can be used as
/// `Arc<dyn Transport>`.
pub trait Transport: Send + Sync + 'static {
    /// Send `buf` to `target`, returning the number of bytes written.
    fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> SendFuture<'a>;

    /// Receive a datagram into `buf`, returning `(bytes_read, source_address)`.
    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> RecvFuture<'a>;

    /// Return the local address this transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Default [`Transport`] implementation wrapping a `tokio::net::UdpSocket`.
pub struct UdpTransport {
    socket: tokio::net::UdpSocket,
}

impl UdpTransport {
    /// Bind a new UDP socket to `addr`.
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> io::Result<Self> {
        let socket = tokio::net::UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// Wrap an existing `UdpSocket`.
    pub fn new(socket: tokio::net::UdpSocket) -> Self {
        Self { socket }
    }
}

impl Transport for UdpTransport {
    fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> SendFuture<'a> {
        Box::pin(self.socket.send_to(buf, target))
    }

    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> RecvFuture<'a> {
        Box::pin(self.socket.recv_from(buf))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
