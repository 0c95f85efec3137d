//! SMTP command verbs.

/// Command verb recognised by the session engines.
///
/// Matched case-insensitively against the first whitespace-delimited word
/// of a received line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// EHLO - extended greeting
    Ehlo,
    /// HELO - legacy greeting
    Helo,
    /// MAIL - start a mail transaction
    Mail,
    /// RCPT - add a recipient
    Rcpt,
    /// DATA - begin message content
    Data,
    /// QUIT - close the session
    Quit,
    /// RSET - discard the envelope
    Rset,
    /// AUTH - authentication (advertised only, never executed)
    Auth,
    /// STARTTLS - opportunistic TLS upgrade
    StartTls,
}

impl Verb {
    /// Parses the verb from a received command line.
    ///
    /// Returns `None` for anything outside the recognised set.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.split_whitespace().next()?;
        match word.to_ascii_uppercase().as_str() {
            "EHLO" => Some(Self::Ehlo),
            "HELO" => Some(Self::Helo),
            "MAIL" => Some(Self::Mail),
            "RCPT" => Some(Self::Rcpt),
            "DATA" => Some(Self::Data),
            "QUIT" => Some(Self::Quit),
            "RSET" => Some(Self::Rset),
            "AUTH" => Some(Self::Auth),
            "STARTTLS" => Some(Self::StartTls),
            _ => None,
        }
    }

    /// Returns the wire form of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
            Self::Rset => "RSET",
            Self::Auth => "AUTH",
            Self::StartTls => "STARTTLS",
        }
    }
}
