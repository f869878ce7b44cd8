//! Transport-level connection establishment: DNS resolution, the
//! `NetworkStream` enum (plain TCP / TLS / mock), and the `Connector`/
//! `ProxyResolver` contracts pluggable transports implement against.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_native_tls::{TlsConnector, TlsStream};
use async_trait::async_trait;
use futures::io::{self, ErrorKind};
use pin_project::pin_project;

#[cfg(feature = "runtime-async-std")]
use async_std::{io::Read, io::Write, net::TcpStream};
#[cfg(feature = "runtime-tokio")]
use tokio::{
    io::{AsyncRead as Read, AsyncWrite as Write},
    net::TcpStream,
};

use crate::runtime::io_timeout;

/// TLS connector plus the domain name to present during the handshake (used
/// both for implicit TLS on connect and for the `STARTTLS` upgrade).
pub struct ClientTlsParameters {
    /// The `native-tls`/`async-native-tls` connector to use.
    pub connector: TlsConnector,
    /// The domain name sent in the SNI / verified against the certificate.
    pub domain: String,
}

impl fmt::Debug for ClientTlsParameters {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ClientTlsParameters")
            .field("domain", &self.domain)
            .finish()
    }
}

impl ClientTlsParameters {
    /// Creates new TLS parameters for `domain`.
    pub fn new(domain: String, connector: TlsConnector) -> ClientTlsParameters {
        ClientTlsParameters { connector, domain }
    }
}

/// Resolves `host` to a connectable socket address list, trying each in turn.
/// DNS failures and "no addresses found" are both reported as
/// [`crate::error::Error::Resolution`] by the caller, not this function.
pub async fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    #[cfg(feature = "runtime-tokio")]
    {
        use tokio::net::lookup_host;
        let addrs: Vec<SocketAddr> = lookup_host((host, port)).await?.collect();
        Ok(addrs)
    }
    #[cfg(feature = "runtime-async-std")]
    {
        use async_std::net::ToSocketAddrs;
        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs().await?.collect();
        Ok(addrs)
    }
}

/// A minimal in-memory duplex stream used by unit tests to script server
/// responses without a live socket.
#[pin_project]
#[derive(Clone, Debug)]
pub struct MockStream {
    #[pin]
    reader: futures::io::Cursor<Vec<u8>>,
    #[pin]
    writer: futures::io::Cursor<Vec<u8>>,
}

impl Default for MockStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStream {
    /// Creates an empty mock stream.
    pub fn new() -> MockStream {
        MockStream {
            reader: futures::io::Cursor::new(Vec::new()),
            writer: futures::io::Cursor::new(Vec::new()),
        }
    }

    /// Creates a mock stream that will yield `data` to readers.
    pub fn with_vec(data: Vec<u8>) -> MockStream {
        MockStream {
            reader: futures::io::Cursor::new(data),
            writer: futures::io::Cursor::new(Vec::new()),
        }
    }

    /// Drains and returns everything written so far.
    pub fn take_vec(&mut self) -> Vec<u8> {
        let vec = self.writer.get_ref().to_vec();
        self.writer.set_position(0);
        self.writer.get_mut().clear();
        vec
    }

    /// Queues `data` to be read next.
    pub fn push_read(&mut self, data: &[u8]) {
        self.reader.set_position(0);
        self.reader.get_mut().clear();
        self.reader.get_mut().extend_from_slice(data);
    }
}

#[cfg(feature = "runtime-tokio")]
impl Read for MockStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context, buf: &mut tokio::io::ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.project().reader.poll_read(cx, buf)
    }
}
#[cfg(feature = "runtime-tokio")]
impl Write for MockStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.project().writer.poll_write(cx, buf)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        self.project().writer.poll_flush(cx)
    }
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        self.project().writer.poll_shutdown(cx)
    }
}
#[cfg(feature = "runtime-async-std")]
impl Read for MockStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        self.project().reader.poll_read(cx, buf)
    }
}
#[cfg(feature = "runtime-async-std")]
impl Write for MockStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.project().writer.poll_write(cx, buf)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        self.project().writer.poll_flush(cx)
    }
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        self.project().writer.poll_close(cx)
    }
}

/// Either a bare TCP stream, a TLS-wrapped one, or a test mock.
#[pin_project(project = NetworkStreamProj)]
#[allow(missing_debug_implementations)]
pub enum NetworkStream {
    /// Plain TCP stream.
    Tcp(#[pin] TcpStream),
    /// TLS-wrapped TCP stream, either via implicit TLS on connect or after
    /// `STARTTLS`.
    Tls(#[pin] TlsStream<TcpStream>),
    /// In-memory stream for tests.
    Mock(#[pin] MockStream),
}

impl NetworkStream {
    /// The remote peer's address, or a fixed loopback address for mocks.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match *self {
            NetworkStream::Tcp(ref s) => s.peer_addr(),
            NetworkStream::Tls(ref s) => s.get_ref().peer_addr(),
            NetworkStream::Mock(_) => Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 0))),
        }
    }

    /// Whether this stream carries TLS.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, NetworkStream::Tls(_))
    }
}

#[cfg(feature = "runtime-tokio")]
impl Read for NetworkStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context, buf: &mut tokio::io::ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_read(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_read(cx, buf),
            NetworkStreamProj::Mock(s) => s.poll_read(cx, buf),
        }
    }
}
#[cfg(feature = "runtime-tokio")]
impl Write for NetworkStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_write(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_write(cx, buf),
            NetworkStreamProj::Mock(s) => s.poll_write(cx, buf),
        }
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_flush(cx),
            NetworkStreamProj::Tls(s) => s.poll_flush(cx),
            NetworkStreamProj::Mock(s) => s.poll_flush(cx),
        }
    }
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_shutdown(cx),
            NetworkStreamProj::Tls(s) => s.poll_shutdown(cx),
            NetworkStreamProj::Mock(s) => s.poll_shutdown(cx),
        }
    }
}
#[cfg(feature = "runtime-async-std")]
impl Read for NetworkStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_read(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_read(cx, buf),
            NetworkStreamProj::Mock(s) => s.poll_read(cx, buf),
        }
    }
}
#[cfg(feature = "runtime-async-std")]
impl Write for NetworkStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_write(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_write(cx, buf),
            NetworkStreamProj::Mock(s) => s.poll_write(cx, buf),
        }
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_flush(cx),
            NetworkStreamProj::Tls(s) => s.poll_flush(cx),
            NetworkStreamProj::Mock(s) => s.poll_flush(cx),
        }
    }
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Tcp(s) => s.poll_close(cx),
            NetworkStreamProj::Tls(s) => s.poll_close(cx),
            NetworkStreamProj::Mock(s) => s.poll_close(cx),
        }
    }
}

/// Establishes the transport-level connection for an `SmtpConnection`:
/// TCP connect, optionally followed by implicit TLS, and the `STARTTLS`
/// upgrade of an already-open plaintext stream.
#[async_trait]
pub trait Connector: Sized {
    /// Connects to `addr`, wrapping in TLS immediately if `tls_parameters`
    /// is given (implicit TLS, e.g. SMTPS on port 465).
    async fn connect(
        addr: &SocketAddr,
        timeout: Option<Duration>,
        tls_parameters: Option<&ClientTlsParameters>,
    ) -> io::Result<Self>;

    /// Upgrades a plaintext stream in place after a successful `STARTTLS`.
    async fn upgrade_tls(self, tls_parameters: &ClientTlsParameters) -> io::Result<Self>;

    /// Whether the stream is presently encrypted.
    fn is_encrypted(&self) -> bool;
}

#[async_trait]
impl Connector for NetworkStream {
    async fn connect(
        addr: &SocketAddr,
        timeout: Option<Duration>,
        tls_parameters: Option<&ClientTlsParameters>,
    ) -> io::Result<NetworkStream> {
        let tcp_stream = match timeout {
            Some(duration) => io_timeout(duration, TcpStream::connect(addr)).await?,
            None => TcpStream::connect(addr).await?,
        };

        match tls_parameters {
            Some(context) => {
                let connector = async {
                    context
                        .connector
                        .connect(&context.domain, tcp_stream)
                        .await
                        .map(NetworkStream::Tls)
                        .map_err(|e| io::Error::new(ErrorKind::Other, e))
                };
                match timeout {
                    Some(duration) => io_timeout(duration, connector).await,
                    None => connector.await,
                }
            }
            None => Ok(NetworkStream::Tcp(tcp_stream)),
        }
    }

    async fn upgrade_tls(self, tls_parameters: &ClientTlsParameters) -> io::Result<Self> {
        match self {
            NetworkStream::Tcp(stream) => {
                let tls_stream = tls_parameters
                    .connector
                    .connect(&tls_parameters.domain, stream)
                    .await
                    .map_err(|err| io::Error::new(ErrorKind::Other, err))?;
                Ok(NetworkStream::Tls(tls_stream))
            }
            already => Ok(already),
        }
    }

    fn is_encrypted(&self) -> bool {
        NetworkStream::is_encrypted(self)
    }
}

/// Contract for a pluggable proxy in front of the real connection (e.g.
/// SOCKS5/HTTP CONNECT). Implementations hand back a connected stream that
/// `SmtpConnection` then treats exactly like a direct `NetworkStream::Tcp`.
#[async_trait]
pub trait ProxyResolver: Send + Sync {
    /// Opens a proxied connection to `host:port`.
    async fn connect(&self, host: &str, port: u16) -> io::Result<NetworkStream>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mock_stream_round_trips() {
        let mock = MockStream::with_vec(vec![1, 2, 3]);
        assert_eq!(mock.reader.get_ref(), &vec![1, 2, 3]);
    }
}
