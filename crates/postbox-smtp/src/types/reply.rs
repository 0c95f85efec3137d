//! SMTP reply types and canned server replies.

use std::fmt::Write as _;

use super::Verb;

/// SMTP reply from a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines, one per wire line.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate code (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes used by the engine.
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication successful
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Syntax error in parameters or arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

/// Builder for wire reply and command lines.
///
/// Non-terminal lines of a multi-line reply use a `-` separator after the
/// code; the terminal line uses a space. [`ReplyBuilder::finish`] guarantees
/// a trailing CRLF.
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    buf: String,
}

impl ReplyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `<code><space>`, marking a terminal reply line.
    #[must_use]
    pub fn code(mut self, code: ReplyCode) -> Self {
        let _ = write!(self.buf, "{code} ");
        self
    }

    /// Appends `<code>-`, marking a continuation line of a multi-line reply.
    #[must_use]
    pub fn code_continue(mut self, code: ReplyCode) -> Self {
        let _ = write!(self.buf, "{code}-");
        self
    }

    /// Appends a command verb.
    #[must_use]
    pub fn command(mut self, verb: Verb) -> Self {
        self.buf.push_str(verb.as_str());
        self
    }

    /// Appends literal text.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.buf.push_str(text);
        self
    }

    /// Ends the current line.
    #[must_use]
    pub fn crlf(mut self) -> Self {
        self.buf.push_str("\r\n");
        self
    }

    /// Returns the assembled string, CRLF-terminated.
    #[must_use]
    pub fn finish(mut self) -> String {
        if !self.buf.ends_with("\r\n") {
            self.buf.push_str("\r\n");
        }
        self.buf
    }
}

/// Canned server reply lines, CRLF included.
pub mod canned {
    /// Sent when the server accepts a QUIT.
    pub const BYE: &str = "221 Bye\r\n";
    /// Generic positive acknowledgement.
    pub const OK: &str = "250 OK\r\n";
    /// Sent before the server-side TLS handshake begins.
    pub const STARTTLS_READY: &str = "220 Ready to start TLS\r\n";
    /// Sent after DATA is accepted.
    pub const START_MAIL_INPUT: &str = "354 Start mail input; end with <CRLF>.<CRLF>\r\n";
    /// Unknown or malformed command verb.
    pub const BAD_COMMAND: &str = "500 Syntax error, command not understood\r\n";
    /// Recognised verb with unusable parameters.
    pub const BAD_SYNTAX: &str = "501 Syntax error in parameters or arguments\r\n";
    /// Command out of sequence for the current session state.
    pub const BAD_SEQUENCE: &str = "503 Bad sequence of commands\r\n";
    /// MAIL FROM refused because the session has not upgraded to TLS.
    pub const TLS_REQUIRED: &str = "503 TLS connection required\r\n";
    /// The completed transaction was rejected.
    pub const TRANSACTION_FAILED: &str = "554 Transaction failed\r\n";
    /// Relay mode is on and the peer has not authenticated.
    pub const RELAY_NOT_ALLOWED: &str = "554 Cannot relay on this server\r\n";
}
