//! Socket establishment: pluggable factories, TLS, DNS fan-out.
//!
//! The engine never opens sockets itself; it asks a [`SocketFactory`], so
//! TLS, SOCKS, or a test harness can slot in without touching the lifecycle
//! code. DNS resolution is separate so the reconnect loop can fan out over
//! every address a hostname resolves to.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;
use tracing::debug;

/// Byte stream the connection runs over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// An established, type-erased transport.
pub type BoxedTransport = Box<dyn Transport>;

/// Produces connected (possibly TLS) sockets.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    /// Connect to `addr`, optionally binding `local_addr` first.
    ///
    /// `server_name` is the configured hostname of the entry being tried;
    /// TLS factories use it for SNI and certificate verification. The
    /// returned [`SocketAddr`] is the local endpoint, when the transport has
    /// one (the ident service keys on its port).
    async fn connect(
        &self,
        addr: SocketAddr,
        server_name: &str,
        local_addr: Option<IpAddr>,
    ) -> io::Result<(BoxedTransport, Option<SocketAddr>)>;
}

async fn tcp_connect(addr: SocketAddr, local_addr: Option<IpAddr>) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if let Some(local) = local_addr {
        socket.bind(SocketAddr::new(local, 0))?;
    }
    socket.connect(addr).await
}

/// Plain TCP.
#[derive(Debug, Default)]
pub struct PlainSocketFactory;

#[async_trait]
impl SocketFactory for PlainSocketFactory {
    async fn connect(
        &self,
        addr: SocketAddr,
        _server_name: &str,
        local_addr: Option<IpAddr>,
    ) -> io::Result<(BoxedTransport, Option<SocketAddr>)> {
        let stream = tcp_connect(addr, local_addr).await?;
        stream.set_nodelay(true)?;
        let local = stream.local_addr().ok();
        Ok((Box::new(stream), local))
    }
}

/// TLS over TCP, verifying against the webpki root set by default.
pub struct TlsSocketFactory {
    connector: TlsConnector,
}

impl TlsSocketFactory {
    /// Factory with the standard root store and no client certificate.
    pub fn new() -> Self {
        let roots =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self::with_config(Arc::new(config))
    }

    /// Factory with a caller-supplied rustls configuration.
    pub fn with_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
        }
    }
}

impl Default for TlsSocketFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocketFactory for TlsSocketFactory {
    async fn connect(
        &self,
        addr: SocketAddr,
        server_name: &str,
        local_addr: Option<IpAddr>,
    ) -> io::Result<(BoxedTransport, Option<SocketAddr>)> {
        let stream = tcp_connect(addr, local_addr).await?;
        stream.set_nodelay(true)?;
        let local = stream.local_addr().ok();
        let dns_name = rustls::pki_types::ServerName::try_from(server_name.to_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let tls = self.connector.connect(dns_name, stream).await?;
        Ok((Box::new(tls), local))
    }
}

/// Hostname → candidate address list.
pub struct Resolver {
    inner: TokioResolver,
}

impl Resolver {
    /// Resolver from system configuration, falling back to defaults.
    pub fn new() -> Self {
        let inner = TokioResolver::builder_tokio()
            .map(|b| b.build())
            .unwrap_or_else(|_| {
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            });
        Self { inner }
    }

    /// All addresses for a hostname, in resolver order. Literal IPs pass
    /// through without a lookup.
    pub async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let lookup = self
            .inner
            .lookup_ip(host)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        debug!(host, count = addrs.len(), "resolved server hostname");
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses for {host}"),
            ));
        }
        Ok(addrs)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
