//! SMTP server: configuration snapshot, policy handlers, accept loop and
//! the per-connection session engine.

mod session;
mod stream;

pub use session::Session;
pub use stream::{ServerStream, TlsIdentity};

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::Instrument as _;

use crate::error::Result;
use crate::message::Message;
use crate::verify::SenderVerifier;

/// Immutable configuration snapshot consulted by every session.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Domain announced in the greeting and EHLO reply.
    pub domain: String,
    /// Relay mode: advertise AUTH and refuse unauthenticated transactions.
    pub relay: bool,
    /// Refuse MAIL FROM until the session has upgraded to TLS.
    /// Enforced only when TLS material is present.
    pub require_tls: bool,
    /// TLS material; absent disables STARTTLS.
    pub tls: Option<TlsIdentity>,
}

impl ServerConfig {
    /// Creates a configuration with relay off, TLS optional and absent.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            relay: false,
            require_tls: false,
            tls: None,
        }
    }

    /// Enables or disables relay mode.
    #[must_use]
    pub const fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    /// Requires a TLS upgrade before mail transactions.
    #[must_use]
    pub const fn with_require_tls(mut self, require: bool) -> Self {
        self.require_tls = require;
        self
    }

    /// Supplies TLS material, enabling the STARTTLS advertisement.
    #[must_use]
    pub fn with_tls(mut self, identity: TlsIdentity) -> Self {
        self.tls = Some(identity);
        self
    }
}

type OnMessage = dyn Fn(&Message) -> std::result::Result<(), String> + Send + Sync;
type RecipientExists = dyn Fn(&str) -> bool + Send + Sync;

/// Caller-supplied policy callbacks.
///
/// Both slots are optional. Without an `on_message` handler every
/// completed transaction is accepted; without a `recipient_exists` check
/// every recipient is taken as deliverable.
#[derive(Default)]
pub struct Handlers {
    on_message: Option<Box<OnMessage>>,
    recipient_exists: Option<Box<RecipientExists>>,
}

impl Handlers {
    /// Creates an empty handlers record: accept everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the completed-message handler. Returning `Err(reason)`
    /// rejects the transaction with `554 Transaction failed`.
    #[must_use]
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Message) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(handler));
        self
    }

    /// Sets the recipient-existence check. A recipient the check refuses
    /// receives `501` and is not added to the envelope.
    #[must_use]
    pub fn recipient_exists<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.recipient_exists = Some(Box::new(check));
        self
    }

    pub(crate) fn dispatch_message(&self, message: &Message) -> std::result::Result<(), String> {
        match &self.on_message {
            Some(handler) => handler(message),
            None => Ok(()),
        }
    }

    /// Returns `None` when no check is configured.
    pub(crate) fn recipient_known(&self, addr: &str) -> Option<bool> {
        self.recipient_exists.as_ref().map(|check| check(addr))
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("on_message", &self.on_message.is_some())
            .field("recipient_exists", &self.recipient_exists.is_some())
            .finish()
    }
}

/// Accept loop: one spawned session task per connection.
///
/// Configuration and handlers are fixed at construction and shared
/// read-only between sessions; there is no mutable state to race on.
#[derive(Debug)]
pub struct Server {
    config: Arc<ServerConfig>,
    handlers: Arc<Handlers>,
    verifier: Option<Arc<SenderVerifier>>,
}

impl Server {
    /// Creates a server with default (accept-everything) handlers.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            handlers: Arc::new(Handlers::new()),
            verifier: None,
        }
    }

    /// Installs the policy handlers.
    #[must_use]
    pub fn with_handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    /// Installs a sender verifier applied to every MAIL FROM.
    #[must_use]
    pub fn with_verifier(mut self, verifier: SenderVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Accepts connections forever, one session task each.
    ///
    /// Session failures are logged and never tear down the loop; the
    /// socket is closed when the session future completes.
    ///
    /// # Errors
    ///
    /// This function only returns on a listener-level failure.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = ?listener.local_addr().ok(), "SMTP server listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(?e, "accept failed");
                    continue;
                }
            };

            let session = Session::new(
                self.config.clone(),
                self.handlers.clone(),
                self.verifier.clone(),
            );
            let span = tracing::info_span!("smtp_session", peer = %peer);
            tokio::spawn(
                async move {
                    if let Err(e) = session.run(stream).await {
                        tracing::warn!(?e, "session ended with error");
                    }
                }
                .instrument(span),
            );
        }
    }
}
