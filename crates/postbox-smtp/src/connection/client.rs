//! Type-state SMTP client driver.

use std::marker::PhantomData;
use std::sync::Arc;

use rustls::ClientConfig;

use super::{ClientStream, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::parser::{is_last_reply_line, parse_reply};
use crate::transport::SmtpTransport;
use crate::types::{Extension, Reply, ReplyCode};

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
///
/// State transitions follow the wire protocol: `Connected` →
/// `MailTransaction` → `RecipientAdded` → `Data` → back to `Connected`.
pub struct Client<State> {
    transport: SmtpTransport<ClientStream>,
    server_info: ServerInfo,
    ehlo_hostname: String,
    server_name: Option<String>,
    tls_config: Option<Arc<ClientConfig>>,
    tls_done: bool,
    _state: PhantomData<State>,
}

impl<State> std::fmt::Debug for Client<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_info", &self.server_info)
            .field("ehlo_hostname", &self.ehlo_hostname)
            .field("server_name", &self.server_name)
            .field("tls_done", &self.tls_done)
            .finish_non_exhaustive()
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server does
    /// not answer with 220.
    pub async fn from_stream(stream: ClientStream) -> Result<Self> {
        let tls_done = stream.is_tls();
        let mut transport = SmtpTransport::client(stream);

        let greeting = read_reply(&mut transport).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::unexpected_reply(
                "connection greeting",
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        // First word after the code is the server's stated hostname.
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            transport,
            server_info: ServerInfo::new(hostname),
            ehlo_hostname: "localhost".to_string(),
            server_name: None,
            tls_config: None,
            tls_done,
            _state: PhantomData,
        })
    }

    /// Connects to `host:port` and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or greeting fails.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = ClientStream::connect(host, port).await?;
        Self::from_stream(stream).await
    }

    /// Overrides the TLS server name used during STARTTLS.
    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Supplies a custom TLS configuration for STARTTLS.
    #[must_use]
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Sends EHLO and collects the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.ehlo_hostname = client_hostname.to_string();
        self.refresh_capabilities().await?;
        Ok(self)
    }

    /// Upgrades the connection with STARTTLS and re-sends EHLO.
    ///
    /// A second upgrade attempt on the same session is refused; so is an
    /// upgrade the server did not advertise.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is unavailable, the server refuses,
    /// or the handshake fails.
    pub async fn starttls(mut self) -> Result<Self> {
        if self.tls_done {
            return Err(Error::InvalidState(
                "TLS has already been negotiated".to_string(),
            ));
        }
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let cmd = Command::StartTls;
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::SERVICE_READY, &cmd)?;

        let stream = self.transport.into_inner();
        let server_name = self
            .server_name
            .clone()
            .or_else(|| stream.dial_host().map(str::to_string))
            .unwrap_or_else(|| self.ehlo_hostname.clone());

        let stream = stream
            .upgrade_to_tls(&server_name, self.tls_config.clone())
            .await?;

        self.transport = SmtpTransport::client(stream);
        self.tls_done = true;

        // RFC 3207: the pre-handshake capability list is void.
        self.refresh_capabilities().await?;
        Ok(self)
    }

    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: &str) -> Result<Client<MailTransaction>> {
        let cmd = Command::MailFrom {
            from: from.to_string(),
            params: Vec::new(),
        };
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::OK, &cmd)?;
        Ok(self.transition())
    }

    async fn refresh_capabilities(&mut self) -> Result<()> {
        let cmd = Command::Ehlo {
            hostname: self.ehlo_hostname.clone(),
        };
        let reply = self.send_command(&cmd).await?;
        let reply = expect(reply, ReplyCode::OK, &cmd)?;

        // The first line is the server's hello and the last closes the
        // reply; only the continuation lines advertise extensions.
        let lines = &reply.message;
        self.server_info.extensions = lines
            .get(1..lines.len().saturating_sub(1))
            .unwrap_or_default()
            .iter()
            .map(|line| Extension::parse(line))
            .collect();
        Ok(())
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: &str) -> Result<Client<RecipientAdded>> {
        let cmd = Command::RcptTo { to: to.to_string() };
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::OK, &cmd)?;
        Ok(self.transition())
    }

    /// Discards the transaction and returns to the connected state.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Connected>> {
        let cmd = Command::Rset;
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::OK, &cmd)?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: &str) -> Result<Self> {
        let cmd = Command::RcptTo { to: to.to_string() };
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::OK, &cmd)?;
        Ok(self)
    }

    /// Begins sending message content.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let cmd = Command::Data;
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::START_DATA, &cmd)?;
        Ok(self.transition())
    }

    /// Discards the transaction and returns to the connected state.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Connected>> {
        let cmd = Command::Rset;
        let reply = self.send_command(&cmd).await?;
        expect(reply, ReplyCode::OK, &cmd)?;
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Writes the message headers and body, dot-stuffed, followed by the
    /// terminator, and waits for the server to accept the transaction.
    ///
    /// Headers are built from the message: `From`, `To`, `Cc`, `Subject`
    /// and one line per custom flag. BCC addresses receive RCPT commands
    /// but never appear in headers.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails or the server rejects the
    /// payload.
    pub async fn send_payload(mut self, message: &Message) -> Result<Client<Connected>> {
        let headers = build_headers(message);
        if !headers.is_empty() {
            self.transport.write(&headers).await?;
        }

        // Blank separator between headers and body.
        self.transport.write("\r\n").await?;

        for line in body_lines(message.data()) {
            if line.starts_with('.') {
                self.transport.write(&format!(".{line}")).await?;
            } else {
                self.transport.write(line).await?;
            }
        }

        self.transport.write(".").await?;

        let reply = read_reply(&mut self.transport).await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::unexpected_reply(
                "message payload",
                reply.code.as_u16(),
                reply.message_text(),
            ));
        }

        Ok(self.transition())
    }
}

// Common implementation for all states.
impl<S> Client<S> {
    /// Returns the server information collected so far.
    #[must_use]
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns true if the connection is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls_done
    }

    /// Sends QUIT and closes the session.
    ///
    /// Failures at this point are swallowed: the transaction is already
    /// complete and the socket is about to close either way.
    pub async fn quit(mut self) {
        let cmd = Command::Quit;
        match self.send_command(&cmd).await {
            Ok(reply) if reply.code == ReplyCode::CLOSING => {}
            Ok(reply) => {
                tracing::debug!(code = reply.code.as_u16(), "unexpected QUIT reply");
            }
            Err(e) => {
                tracing::debug!(?e, "QUIT exchange failed");
            }
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        self.transport.write(&cmd.serialize()).await?;
        read_reply(&mut self.transport).await
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            transport: self.transport,
            server_info: self.server_info,
            ehlo_hostname: self.ehlo_hostname,
            server_name: self.server_name,
            tls_config: self.tls_config,
            tls_done: self.tls_done,
            _state: PhantomData,
        }
    }
}

/// Reads one (possibly multi-line) reply from the server.
async fn read_reply(transport: &mut SmtpTransport<ClientStream>) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = transport.read_line().await?;
        let line = line.trim_end_matches("\r\n");
        if line.is_empty() {
            continue;
        }

        let last = is_last_reply_line(line);
        lines.push(line.to_string());
        if last {
            break;
        }
    }

    parse_reply(&lines)
}

fn expect(reply: Reply, code: ReplyCode, cmd: &Command) -> Result<Reply> {
    if reply.code == code {
        Ok(reply)
    } else {
        Err(Error::unexpected_reply(
            cmd.display(),
            reply.code.as_u16(),
            reply.message_text(),
        ))
    }
}

/// Builds the header block written before the body. BCC is deliberately
/// absent.
fn build_headers(message: &Message) -> String {
    let mut headers = String::new();

    if !message.from().is_empty() {
        headers.push_str(&format!("From: <{}>\r\n", message.from()));
    }

    if !message.to().is_empty() {
        headers.push_str(&format!("To: {}\r\n", bracket_list(message.to())));
    }

    if !message.cc().is_empty() {
        headers.push_str(&format!("Cc: {}\r\n", bracket_list(message.cc())));
    }

    if !message.subject().is_empty() {
        headers.push_str(&format!("Subject: {}\r\n", message.subject()));
    }

    for flag in message.flags() {
        if !flag.key.is_empty() && !flag.value.is_empty() {
            headers.push_str(&format!("{}: {}\r\n", flag.key, flag.value));
        }
    }

    headers
}

fn bracket_list(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|addr| format!("<{addr}>"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits a body into logical lines, tolerating LF or CRLF endings and
/// dropping only the empty artefact a single trailing newline produces.
fn body_lines(body: &str) -> Vec<&str> {
    if body.is_empty() {
        return Vec::new();
    }
    let stripped = body
        .strip_suffix('\n')
        .map_or(body, |b| b.strip_suffix('\r').unwrap_or(b));
    stripped
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn headers_exclude_bcc() {
        let mut message = Message::new();
        message
            .set_from("a@x.example")
            .append_to("b@y.example")
            .append_cc("c@z.example")
            .append_bcc("hidden@z.example")
            .set_subject("Hi");

        let headers = build_headers(&message);
        assert!(headers.contains("From: <a@x.example>\r\n"));
        assert!(headers.contains("To: <b@y.example>\r\n"));
        assert!(headers.contains("Cc: <c@z.example>\r\n"));
        assert!(headers.contains("Subject: Hi\r\n"));
        assert!(!headers.contains("hidden@z.example"));
        assert!(!headers.contains("Bcc"));
    }

    #[test]
    fn headers_join_multiple_recipients() {
        let mut message = Message::new();
        message.append_to("a@x.example").append_to("b@y.example");
        let headers = build_headers(&message);
        assert!(headers.contains("To: <a@x.example>, <b@y.example>\r\n"));
    }

    #[test]
    fn headers_include_flags() {
        let mut message = Message::new();
        message.append_flag(crate::types::Param::new("ENVID", "abc"));
        message.append_flag(crate::types::Param::new("SMTPUTF8", ""));
        let headers = build_headers(&message);
        assert!(headers.contains("ENVID: abc\r\n"));
        assert!(!headers.contains("SMTPUTF8"));
    }

    #[test]
    fn body_lines_preserve_interior_blanks() {
        assert_eq!(body_lines("a\r\n\r\nb\r\n"), ["a", "", "b"]);
    }

    #[test]
    fn body_lines_tolerate_bare_lf() {
        assert_eq!(body_lines("a\nb"), ["a", "b"]);
    }

    #[test]
    fn body_lines_empty_body() {
        assert!(body_lines("").is_empty());
        assert_eq!(body_lines("\r\n"), [""]);
    }
}
