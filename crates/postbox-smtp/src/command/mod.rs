//! Client-side SMTP command serialisation.

use std::fmt::Write as _;

use crate::types::Param;

/// SMTP command issued by the client engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - legacy greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - upgrade to TLS
    StartTls,
    /// MAIL FROM - start a mail transaction
    MailFrom {
        /// Sender address, without brackets
        from: String,
        /// Extension parameters appended after the address
        params: Vec<Param>,
    },
    /// RCPT TO - add a recipient
    RcptTo {
        /// Recipient address, without brackets
        to: String,
    },
    /// DATA - begin message content
    Data,
    /// RSET - discard the envelope
    Rset,
    /// QUIT - close the session
    Quit,
}

impl Command {
    /// Serialises the command to its CRLF-terminated wire line.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut line = String::new();

        match self {
            Self::Helo { hostname } => {
                let _ = write!(line, "HELO {hostname}");
            }
            Self::Ehlo { hostname } => {
                let _ = write!(line, "EHLO {hostname}");
            }
            Self::StartTls => line.push_str("STARTTLS"),
            Self::MailFrom { from, params } => {
                let _ = write!(line, "MAIL FROM:<{from}>");
                for param in params {
                    if param.value.is_empty() {
                        let _ = write!(line, " {}", param.key);
                    } else {
                        let _ = write!(line, " {}={}", param.key, param.value);
                    }
                }
            }
            Self::RcptTo { to } => {
                let _ = write!(line, "RCPT TO:<{to}>");
            }
            Self::Data => line.push_str("DATA"),
            Self::Rset => line.push_str("RSET"),
            Self::Quit => line.push_str("QUIT"),
        }

        line.push_str("\r\n");
        line
    }

    /// Returns the wire line without its CRLF, for error reporting.
    #[must_use]
    pub fn display(&self) -> String {
        let mut line = self.serialize();
        line.truncate(line.len() - 2);
        line
    }
}
