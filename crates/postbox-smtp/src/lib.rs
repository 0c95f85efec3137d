//! # postbox-smtp
//!
//! An SMTP endpoint pair implementing RFC 5321 with the EHLO, 8BITMIME,
//! AUTH (advertised only) and STARTTLS (RFC 3207) extensions.
//!
//! The crate provides both sides of the wire:
//!
//! - A **server session engine** that accepts SMTP sessions and surfaces
//!   completed messages to the embedding application through callbacks.
//! - A **client driver** that delivers a constructed [`Message`] to a
//!   remote SMTP server, with opportunistic STARTTLS.
//!
//! ## Server
//!
//! ```ignore
//! use postbox_smtp::server::{Handlers, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> postbox_smtp::Result<()> {
//!     let handlers = Handlers::new().on_message(|message| {
//!         println!("mail from {}", message.from());
//!         Ok(())
//!     });
//!
//!     let server = Server::new(ServerConfig::new("mail.example"))
//!         .with_handlers(handlers);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:2525").await?;
//!     server.serve(listener).await
//! }
//! ```
//!
//! ## Client
//!
//! ```ignore
//! use postbox_smtp::connection::{send_message, ClientStream, SendOptions};
//! use postbox_smtp::Message;
//!
//! #[tokio::main]
//! async fn main() -> postbox_smtp::Result<()> {
//!     let mut message = Message::new();
//!     message
//!         .set_from("sender@example.com")
//!         .append_to("recipient@example.com")
//!         .set_subject("Hello")
//!         .set_data("Hello, world!\r\n");
//!
//!     let stream = ClientStream::connect("smtp.example.com", 587).await?;
//!     send_message(stream, &message, &SendOptions::default()).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: client-side command serialisation
//! - [`connection`]: client stream, type-state driver, delivery entry point
//! - [`parser`]: reply and address parsing
//! - [`server`]: server configuration, handlers, accept loop, session engine
//! - [`transport`]: CRLF line transport with per-operation deadlines
//! - [`types`]: reply codes, verbs, extensions, parameters
//! - [`verify`]: configurable sender-address verification

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
mod message;
pub mod parser;
pub mod server;
pub mod transport;
pub mod types;
pub mod verify;

pub use connection::{send_message, Client, ClientStream, SendOptions, ServerInfo};
pub use error::{Error, Result};
pub use message::{Message, MessageDto};
pub use server::{Handlers, Server, ServerConfig, Session, TlsIdentity};
pub use types::{Mailbox, Param, Reply, ReplyCode, Verb};
pub use verify::SenderVerifier;
