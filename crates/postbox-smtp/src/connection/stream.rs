//! Client-side byte stream: plain TCP or TLS, with STARTTLS upgrade.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};

/// A client transport that is either plaintext or TLS.
///
/// Created from an already-connected [`TcpStream`] or through the
/// [`ClientStream::connect`] convenience dialer; the dialer remembers the
/// host it was given so the TLS upgrade can use it as the SNI name.
pub struct ClientStream {
    inner: Inner,
    host: Option<String>,
}

enum Inner {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ClientStream {
    /// Wraps an already-connected plaintext stream.
    ///
    /// No dial host is recorded; callers that intend to STARTTLS should
    /// set a server name on the client driving this stream.
    #[must_use]
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: Inner::Plain(stream),
            host: None,
        }
    }

    /// Connects to `host:port` over plain TCP, recording `host` for SNI.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).await?;
        Ok(Self {
            inner: Inner::Plain(stream),
            host: Some(host.to_string()),
        })
    }

    /// Returns the host this stream was dialled with, if known.
    #[must_use]
    pub fn dial_host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }

    /// Upgrades a plaintext stream to TLS.
    ///
    /// `server_name` is the SNI name sent during the handshake. When
    /// `config` is `None`, a default configuration with the bundled web
    /// PKI roots is used; certificate verification is always required by
    /// the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS, the server name is
    /// unusable, or the handshake fails.
    pub async fn upgrade_to_tls(
        self,
        server_name: &str,
        config: Option<Arc<ClientConfig>>,
    ) -> Result<Self> {
        let tcp = match self.inner {
            Inner::Plain(tcp) => tcp,
            Inner::Tls(_) => {
                return Err(Error::InvalidState("stream is already TLS".to_string()))
            }
        };

        let config = config.unwrap_or_else(default_client_config);
        let connector = TlsConnector::from(config);
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| Error::Protocol(format!("invalid TLS server name: {server_name}")))?;

        let tls = connector.connect(name, tcp).await.map_err(|e| {
            tracing::debug!(?e, server_name, "client TLS handshake failed");
            Error::Io(e)
        })?;

        Ok(Self {
            inner: Inner::Tls(Box::new(tls)),
            host: self.host,
        })
    }
}

/// Builds the default client TLS configuration from the bundled roots.
#[must_use]
pub fn default_client_config() -> Arc<ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Inner::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            Inner::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Inner::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Inner::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Inner::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
