//! Per-connection server session engine.
//!
//! One session owns one accepted transport from greeting to QUIT (or
//! termination). Reads and writes strictly alternate; all blocking sits
//! in the line transport, and every protocol or policy failure becomes a
//! wire reply rather than an error.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use super::stream::ServerStream;
use super::{Handlers, ServerConfig};
use crate::error::Result;
use crate::message::Message;
use crate::parser::{extract_addr, parse_named_addresses};
use crate::transport::SmtpTransport;
use crate::types::{canned, parse_params, ReplyBuilder, ReplyCode, Verb};
use crate::verify::SenderVerifier;

type Transport<S> = SmtpTransport<ServerStream<S>>;

/// Where the session stands in the command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Greeting sent; waiting for EHLO/HELO.
    Greeted,
    /// EHLO done in relay mode; transactions refused until an external
    /// authentication flow moves the session forward.
    RelayHold,
    /// Ready for MAIL FROM.
    MailReady,
    /// MAIL FROM accepted; ready for RCPT TO or DATA.
    RcptReady,
}

/// Negotiated DATA body mode from the `BODY=` MAIL parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BodyMode {
    SevenBit,
    #[default]
    EightBitMime,
}

/// A single server-side SMTP session.
///
/// Construct one per accepted connection and call [`Session::run`] with
/// the transport; control returns when the session ends, after which the
/// caller closes the socket.
pub struct Session<S> {
    config: Arc<ServerConfig>,
    handlers: Arc<Handlers>,
    verifier: Option<Arc<SenderVerifier>>,
    state: State,
    message: Message,
    body_mode: BodyMode,
    tls_active: bool,
    _stream: std::marker::PhantomData<S>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session over the given configuration and policy.
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        handlers: Arc<Handlers>,
        verifier: Option<Arc<SenderVerifier>>,
    ) -> Self {
        Self {
            config,
            handlers,
            verifier,
            state: State::Greeted,
            message: Message::new(),
            body_mode: BodyMode::default(),
            tls_active: false,
            _stream: std::marker::PhantomData,
        }
    }

    /// Runs the session to completion.
    ///
    /// A peer disconnect or deadline expiry is a normal way for a session
    /// to end and is not reported as an error.
    ///
    /// # Errors
    ///
    /// Returns an error on unexpected I/O failures or a failed TLS
    /// handshake.
    pub async fn run(mut self, stream: S) -> Result<()> {
        let transport = SmtpTransport::server(ServerStream::plain(stream));
        match self.drive(transport).await {
            Err(e) if e.is_disconnect() => {
                tracing::debug!("session closed by peer or deadline");
                Ok(())
            }
            other => other,
        }
    }

    async fn drive(&mut self, mut transport: Transport<S>) -> Result<()> {
        let greeting = ReplyBuilder::new()
            .code(ReplyCode::SERVICE_READY)
            .text(&format!("{} Service Ready", self.config.domain))
            .finish();
        transport.write(&greeting).await?;

        loop {
            let line = transport.read_line().await?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Stray browsers and scanners speak HTTP at mail ports; answer
            // once and keep the session so the peer can still QUIT.
            if line.to_ascii_uppercase().contains("HTTP") {
                tracing::debug!("HTTP request on SMTP port");
                transport.write(canned::BAD_COMMAND).await?;
                continue;
            }

            let Some(verb) = Verb::parse(line) else {
                transport.write(canned::BAD_COMMAND).await?;
                continue;
            };

            match verb {
                Verb::Ehlo | Verb::Helo => self.handle_hello(&mut transport, line).await?,
                Verb::Mail => self.handle_mail(&mut transport, line).await?,
                Verb::Rcpt => self.handle_rcpt(&mut transport, line).await?,
                Verb::Data => self.handle_data(&mut transport).await?,
                Verb::Rset => self.handle_rset(&mut transport).await?,
                Verb::StartTls => transport = self.handle_starttls(transport).await?,
                Verb::Auth => transport.write(canned::BAD_SEQUENCE).await?,
                Verb::Quit => {
                    transport.write(canned::BYE).await?;
                    return Ok(());
                }
            }
        }
    }

    /// EHLO/HELO: advertise capabilities as one multi-line reply and open
    /// (or re-open) the session for transactions.
    async fn handle_hello(&mut self, transport: &mut Transport<S>, line: &str) -> Result<()> {
        let Some(client_domain) = line.split_whitespace().nth(1) else {
            transport.write(canned::BAD_SYNTAX).await?;
            return Ok(());
        };

        let mut reply = ReplyBuilder::new()
            .code_continue(ReplyCode::OK)
            .text(&format!("{} Hello {client_domain}", self.config.domain))
            .crlf();
        if self.config.tls.is_some() && !self.tls_active {
            reply = reply.code_continue(ReplyCode::OK).text("STARTTLS").crlf();
        }
        if self.config.relay {
            reply = reply
                .code_continue(ReplyCode::OK)
                .text("AUTH PLAIN LOGIN")
                .crlf();
        }
        let reply = reply
            .code_continue(ReplyCode::OK)
            .text("8BITMIME")
            .crlf()
            .code(ReplyCode::OK)
            .text("OK")
            .finish();
        transport.write(&reply).await?;

        // EHLO discards any transaction in progress.
        self.message.clear();
        self.state = if self.config.relay {
            State::RelayHold
        } else {
            State::MailReady
        };
        Ok(())
    }

    async fn handle_mail(&mut self, transport: &mut Transport<S>, line: &str) -> Result<()> {
        match self.state {
            State::MailReady => {}
            State::RelayHold => {
                transport.write(canned::RELAY_NOT_ALLOWED).await?;
                return Ok(());
            }
            State::Greeted | State::RcptReady => {
                transport.write(canned::BAD_SEQUENCE).await?;
                return Ok(());
            }
        }

        // Only enforced when an upgrade is actually on offer; without
        // TLS material the session could never accept any mail.
        if self.config.require_tls && self.config.tls.is_some() && !self.tls_active {
            transport.write(canned::TLS_REQUIRED).await?;
            return Ok(());
        }

        if !line.to_ascii_uppercase().starts_with("MAIL FROM:") {
            transport.write(canned::BAD_COMMAND).await?;
            return Ok(());
        }

        let tail = &line["MAIL FROM:".len()..];
        let addr = extract_addr(tail);
        if addr.is_empty() {
            transport.write(canned::BAD_SYNTAX).await?;
            return Ok(());
        }

        if let Some(verifier) = &self.verifier {
            if !verifier.verify(&addr).await {
                tracing::debug!(%addr, "sender refused by verifier");
                self.message.clear();
                transport.write(canned::TRANSACTION_FAILED).await?;
                return Ok(());
            }
        }

        self.message.set_from(addr);
        if let Some(end) = tail.find('>') {
            for param in parse_params(&tail[end + 1..]) {
                if param.key == "BODY" {
                    self.body_mode = if param.value.eq_ignore_ascii_case("7BIT") {
                        BodyMode::SevenBit
                    } else {
                        BodyMode::EightBitMime
                    };
                }
                self.message.append_flag(param);
            }
        }

        transport.write(canned::OK).await?;
        self.state = State::RcptReady;
        Ok(())
    }

    async fn handle_rcpt(&mut self, transport: &mut Transport<S>, line: &str) -> Result<()> {
        match self.state {
            State::RcptReady => {}
            State::RelayHold => {
                transport.write(canned::RELAY_NOT_ALLOWED).await?;
                return Ok(());
            }
            State::Greeted | State::MailReady => {
                transport.write(canned::BAD_SEQUENCE).await?;
                return Ok(());
            }
        }

        if !line.to_ascii_uppercase().starts_with("RCPT TO:") {
            transport.write(canned::BAD_COMMAND).await?;
            return Ok(());
        }

        let addr = extract_addr(&line["RCPT TO:".len()..]);
        if addr.is_empty() {
            transport.write(canned::BAD_SYNTAX).await?;
            return Ok(());
        }

        if self.handlers.recipient_known(&addr) == Some(false) {
            tracing::debug!(%addr, "unknown recipient refused");
            transport.write(canned::BAD_SYNTAX).await?;
            return Ok(());
        }

        self.message.append_to(addr);
        transport.write(canned::OK).await?;
        Ok(())
    }

    async fn handle_data(&mut self, transport: &mut Transport<S>) -> Result<()> {
        match self.state {
            State::RcptReady if !self.message.to().is_empty() => {}
            State::RelayHold => {
                transport.write(canned::RELAY_NOT_ALLOWED).await?;
                return Ok(());
            }
            _ => {
                transport.write(canned::BAD_SEQUENCE).await?;
                return Ok(());
            }
        }

        transport.write(canned::START_MAIL_INPUT).await?;
        self.capture_data(transport).await?;

        tracing::debug!(
            from = self.message.from(),
            recipients = self.message.to().len(),
            body_mode = ?self.body_mode,
            "message captured"
        );

        match self.handlers.dispatch_message(&self.message) {
            Ok(()) => transport.write(canned::OK).await?,
            Err(reason) => {
                tracing::warn!(%reason, "message rejected by handler");
                transport.write(canned::TRANSACTION_FAILED).await?;
            }
        }

        self.message.clear();
        // RFC 5321 leaves a finished transaction ready for the next MAIL
        // FROM; no fresh EHLO is needed.
        self.state = State::MailReady;
        Ok(())
    }

    /// DATA capture: reads until the lone-dot terminator, removing the
    /// transparency dot before any classification, folding headers and
    /// collecting the raw payload.
    async fn capture_data(&mut self, transport: &mut Transport<S>) -> Result<()> {
        let mut raw = String::new();
        let mut in_headers = true;
        let mut pending: Option<(String, String)> = None;

        loop {
            let line = transport.read_line().await?;
            let line = line.trim_end_matches("\r\n");

            if line == "." {
                if let Some((name, value)) = pending.take() {
                    self.apply_header(&name, &value);
                }
                break;
            }

            let line = line.strip_prefix('.').unwrap_or(line);

            if in_headers {
                if line.is_empty() {
                    if let Some((name, value)) = pending.take() {
                        self.apply_header(&name, &value);
                    }
                    in_headers = false;
                } else if (line.starts_with(' ') || line.starts_with('\t')) && pending.is_some() {
                    if let Some((_, value)) = pending.as_mut() {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                } else if line.find(':').is_some_and(|i| i > 0) {
                    if let Some((name, value)) = pending.take() {
                        self.apply_header(&name, &value);
                    }
                    let (name, value) = line.split_once(':').unwrap_or((line, ""));
                    pending = Some((name.trim().to_string(), value.trim().to_string()));
                } else {
                    // Not a header and not a continuation: the body has
                    // started without a blank separator.
                    if let Some((name, value)) = pending.take() {
                        self.apply_header(&name, &value);
                    }
                    in_headers = false;
                }
            }

            raw.push_str(line);
            raw.push_str("\r\n");
        }

        self.message.set_data(raw);
        Ok(())
    }

    /// Recognised headers feed the envelope; everything else survives
    /// only in the raw payload.
    fn apply_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("subject") {
            self.message.set_subject(value);
        } else if name.eq_ignore_ascii_case("cc") {
            for mailbox in parse_named_addresses(value) {
                self.message.append_cc(mailbox.address);
            }
        } else if name.eq_ignore_ascii_case("bcc") {
            for mailbox in parse_named_addresses(value) {
                self.message.append_bcc(mailbox.address);
            }
        }
    }

    async fn handle_rset(&mut self, transport: &mut Transport<S>) -> Result<()> {
        self.message.clear();
        self.body_mode = BodyMode::default();
        // RSET discards the envelope but never the greeting or the
        // authenticated transport.
        if matches!(self.state, State::MailReady | State::RcptReady) {
            self.state = State::MailReady;
        }
        transport.write(canned::OK).await?;
        Ok(())
    }

    /// STARTTLS: swap the transport for an encrypted one and start over.
    ///
    /// Permitted only with TLS material configured, before any upgrade,
    /// and outside a mail transaction; the relay hold counts as outside,
    /// since EHLO advertised the upgrade there. A handshake failure ends
    /// the session without a further wire reply.
    async fn handle_starttls(&mut self, mut transport: Transport<S>) -> Result<Transport<S>> {
        let in_window = !self.tls_active
            && matches!(
                self.state,
                State::Greeted | State::MailReady | State::RelayHold
            );
        let Some(identity) = self.config.tls.as_ref().filter(|_| in_window) else {
            transport.write(canned::BAD_SEQUENCE).await?;
            return Ok(transport);
        };

        transport.write(canned::STARTTLS_READY).await?;

        // The buffered reader is dropped with the old transport: nothing
        // read before the handshake may carry over (RFC 3207).
        let stream = transport.into_inner();
        let stream = stream.upgrade(identity).await?;

        self.tls_active = true;
        self.state = State::Greeted;
        self.message.clear();
        tracing::debug!("session upgraded to TLS");

        Ok(SmtpTransport::server(stream))
    }
}
