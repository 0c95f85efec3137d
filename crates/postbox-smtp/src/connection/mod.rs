//! Client connection management: stream, type-state driver, delivery
//! entry point.

mod client;
mod stream;

pub use client::{Client, Connected, Data, MailTransaction, RecipientAdded};
pub use stream::{default_client_config, ClientStream};

use std::collections::HashSet;
use std::sync::Arc;

use rustls::ClientConfig;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::types::Extension;

/// Server capabilities collected from the greeting and EHLO replies.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from the greeting.
    pub hostname: String,
    /// Advertised extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Creates server info with an empty extension set.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            extensions: HashSet::new(),
        }
    }

    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS was advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }
}

/// Options for a one-shot message delivery.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Hostname announced in EHLO; empty falls back to `localhost`.
    pub client_hostname: String,
    /// Explicit TLS server name, overriding the dial host.
    pub server_name: Option<String>,
    /// Custom TLS configuration; the default verifies against the bundled
    /// web PKI roots.
    pub tls_config: Option<Arc<ClientConfig>>,
}

/// Delivers a message over an established transport.
///
/// Drives the full client sequence: greeting, EHLO, opportunistic
/// STARTTLS when advertised (followed by a fresh EHLO), MAIL FROM, one
/// RCPT TO per recipient (`to`, then `cc`, then `bcc`), DATA, dot-stuffed
/// payload, and QUIT. The first non-matching reply aborts with an error
/// naming the failing command and the server's text.
///
/// # Errors
///
/// Returns an error if the message has no sender or no recipients, or if
/// any step of the exchange fails.
pub async fn send_message(
    stream: ClientStream,
    message: &Message,
    options: &SendOptions,
) -> Result<()> {
    if message.from().is_empty() {
        return Err(Error::InvalidState("message has no sender".to_string()));
    }
    if message.all_recipients().next().is_none() {
        return Err(Error::InvalidState("message has no recipients".to_string()));
    }

    let hostname = if options.client_hostname.is_empty() {
        "localhost"
    } else {
        &options.client_hostname
    };

    let mut client = Client::from_stream(stream).await?;
    if let Some(name) = &options.server_name {
        client = client.with_server_name(name.clone());
    }
    if let Some(config) = &options.tls_config {
        client = client.with_tls_config(config.clone());
    }

    let mut client = client.ehlo(hostname).await?;

    if client.server_info().supports_starttls() && !client.is_tls() {
        client = client.starttls().await?;
    }

    let client = client.mail_from(message.from()).await?;

    let mut recipients = message.all_recipients();
    // The type-state split makes the first RCPT distinct from the rest.
    let first = recipients.next().unwrap_or_default();
    let mut client = client.rcpt_to(first).await?;
    for recipient in recipients {
        client = client.rcpt_to(recipient).await?;
    }

    let client = client.data().await?;
    let client = client.send_payload(message).await?;
    client.quit().await;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::server::{Handlers, ServerConfig, Session};
    use crate::types::Param;
    use std::sync::mpsc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Accepts one connection and plays a fixed server script, recording
    /// every line the client sends.
    async fn scripted_server(
        listener: TcpListener,
        rcpt_reply: &'static str,
    ) -> Vec<String> {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut transcript = Vec::new();

        write_half
            .write_all(b"220 test.server Service Ready\r\n")
            .await
            .unwrap();

        let mut in_data = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            transcript.push(line.clone());

            if in_data {
                if line == "." {
                    in_data = false;
                    write_half.write_all(b"250 OK\r\n").await.unwrap();
                }
                continue;
            }

            let upper = line.to_ascii_uppercase();
            let reply: &[u8] = if upper.starts_with("EHLO") {
                b"250-test.server Hello client\r\n250-8BITMIME\r\n250 OK\r\n"
            } else if upper.starts_with("MAIL") {
                b"250 OK\r\n"
            } else if upper.starts_with("RCPT") {
                rcpt_reply.as_bytes()
            } else if upper == "DATA" {
                in_data = true;
                b"354 Start mail input; end with <CRLF>.<CRLF>\r\n"
            } else if upper == "QUIT" {
                write_half.write_all(b"221 Bye\r\n").await.unwrap();
                break;
            } else {
                b"500 Syntax error, command not understood\r\n"
            };
            write_half.write_all(reply).await.unwrap();
        }

        transcript
    }

    fn sample_message() -> Message {
        let mut message = Message::new();
        message
            .set_from("a@x.example")
            .append_to("b@y.example")
            .append_cc("c@z.example")
            .append_bcc("d@z.example")
            .set_subject("Hi")
            .set_data("body line\r\n.stuffed\r\n");
        message
    }

    #[tokio::test]
    async fn send_message_drives_full_sequence() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(scripted_server(listener, "250 OK\r\n"));

        let stream = ClientStream::connect(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        let options = SendOptions {
            client_hostname: "client.example".to_string(),
            ..SendOptions::default()
        };
        send_message(stream, &sample_message(), &options).await.unwrap();

        let transcript = server.await.unwrap();
        assert_eq!(transcript[0], "EHLO client.example");
        assert_eq!(transcript[1], "MAIL FROM:<a@x.example>");
        assert_eq!(transcript[2], "RCPT TO:<b@y.example>");
        assert_eq!(transcript[3], "RCPT TO:<c@z.example>");
        assert_eq!(transcript[4], "RCPT TO:<d@z.example>");
        assert_eq!(transcript[5], "DATA");

        // Headers, then blank separator, then dot-stuffed body, then
        // terminator and QUIT.
        assert!(transcript.contains(&"From: <a@x.example>".to_string()));
        assert!(transcript.contains(&"To: <b@y.example>".to_string()));
        assert!(transcript.contains(&"Cc: <c@z.example>".to_string()));
        assert!(transcript.contains(&"Subject: Hi".to_string()));
        assert!(!transcript.iter().any(|l| l.starts_with("Bcc")));
        assert!(transcript.contains(&"body line".to_string()));
        assert!(transcript.contains(&"..stuffed".to_string()));

        let dot = transcript.iter().position(|l| l == ".").unwrap();
        assert_eq!(transcript[dot + 1], "QUIT");
    }

    #[tokio::test]
    async fn rejected_recipient_names_the_command() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(scripted_server(listener, "554 No such user\r\n"));

        let stream = ClientStream::connect(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        let err = send_message(stream, &sample_message(), &SendOptions::default())
            .await
            .unwrap_err();

        match err {
            Error::UnexpectedReply { command, code, message } => {
                assert_eq!(command, "RCPT TO:<b@y.example>");
                assert_eq!(code, 554);
                assert!(message.contains("No such user"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        drop(server);
    }

    #[tokio::test]
    async fn rejected_greeting_fails_fast() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (_, mut write_half) = stream.into_split();
            write_half.write_all(b"554 go away\r\n").await.unwrap();
        });

        let stream = ClientStream::connect(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        let err = Client::from_stream(stream).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply { code: 554, .. }));
    }

    #[tokio::test]
    async fn messages_without_sender_or_recipients_are_refused_locally() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut no_sender = Message::new();
        no_sender.append_to("b@y.example");
        let stream = ClientStream::connect(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        assert!(matches!(
            send_message(stream, &no_sender, &SendOptions::default()).await,
            Err(Error::InvalidState(_))
        ));

        let mut no_recipients = Message::new();
        no_recipients.set_from("a@x.example");
        let stream = ClientStream::connect(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        assert!(matches!(
            send_message(stream, &no_recipients, &SendOptions::default()).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn loop_back_delivery_through_the_server_engine() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = mpsc::channel();
        let handlers = Handlers::new().on_message(move |message| {
            tx.send(message.clone()).map_err(|e| e.to_string())
        });
        let session = Session::new(
            Arc::new(ServerConfig::new("localhost")),
            Arc::new(handlers),
            None,
        );
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            session.run(stream).await
        });

        let mut outgoing = sample_message();
        outgoing.append_flag(Param::new("ENVID", "tag-1"));

        let stream = ClientStream::connect(&addr.ip().to_string(), addr.port())
            .await
            .unwrap();
        let options = SendOptions {
            client_hostname: "client.example".to_string(),
            ..SendOptions::default()
        };
        send_message(stream, &outgoing, &options).await.unwrap();
        server.await.unwrap().unwrap();

        let received = rx.recv().unwrap();
        assert_eq!(received.from(), outgoing.from());
        // Every recipient was RCPT'd, so the server's envelope holds the
        // union in order.
        let expected: Vec<&str> = outgoing.all_recipients().collect();
        assert_eq!(received.to(), expected);
        // Cc came back through the headers; Bcc never appears there.
        assert_eq!(received.cc(), outgoing.cc());
        assert!(received.bcc().is_empty());
        assert_eq!(received.subject(), outgoing.subject());
        assert!(received.data().contains("body line\r\n"));
        assert!(received.data().contains(".stuffed\r\n"));
        assert!(received.data().contains("ENVID: tag-1\r\n"));
        assert!(!received.data().contains("..stuffed"));
    }
}
