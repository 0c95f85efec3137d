//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// JSON (de)serialisation error for the message transport DTO.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer closed the connection, or a read/write deadline expired.
    ///
    /// Timeouts, EOF and broken pipes are deliberately folded together:
    /// all of them end the session the same way.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Server answered a command with an unexpected reply.
    #[error("{command} failed: {code} {message}")]
    UnexpectedReply {
        /// The command that was on the wire (e.g. `RCPT TO:<a@b>`).
        command: String,
        /// Reply code the server sent.
        code: u16,
        /// Reply text the server sent.
        message: String,
    },

    /// Malformed data on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Feature not offered by the peer.
    #[error("server does not support {0}")]
    NotSupported(String),

    /// Operation is not valid in the current connection state.
    #[error("invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an [`Error::UnexpectedReply`] for a failed command.
    #[must_use]
    pub fn unexpected_reply(
        command: impl Into<String>,
        code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::UnexpectedReply {
            command: command.into(),
            code,
            message: message.into(),
        }
    }

    /// Returns true if this error carries a permanent (5xx) reply code.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::UnexpectedReply { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if the session ended because the peer went away.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}
