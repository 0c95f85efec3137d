//! SMTP extension tokens.

/// Extension advertised in an EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - authentication mechanisms offered by the server
    Auth(Vec<AuthMechanism>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// Anything this engine does not act on.
    Unknown(String),
}

impl Extension {
    /// Parses an extension token from one EHLO advertisement line.
    ///
    /// The line is whitespace-trimmed and the keyword matched
    /// case-insensitively; unrecognised keywords are preserved verbatim.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts.filter_map(AuthMechanism::parse).collect()),
            "8BITMIME" => Self::EightBitMime,
            _ => Self::Unknown(line.trim().to_string()),
        }
    }
}

/// SASL authentication mechanism named in an AUTH advertisement.
///
/// The engines advertise and recognise these; the credential exchange
/// itself is delegated to the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - single-message plaintext
    Plain,
    /// LOGIN - legacy two-step plaintext
    Login,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_starttls() {
        assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(Extension::parse("  STARTTLS  "), Extension::StartTls);
    }

    #[test]
    fn parse_8bitmime() {
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
    }

    #[test]
    fn parse_auth_mechanisms() {
        let ext = Extension::parse("AUTH PLAIN LOGIN");
        assert_eq!(
            ext,
            Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login])
        );
    }

    #[test]
    fn parse_auth_skips_unknown_mechanisms() {
        let ext = Extension::parse("AUTH CRAM-MD5 PLAIN");
        assert_eq!(ext, Extension::Auth(vec![AuthMechanism::Plain]));
    }

    #[test]
    fn parse_unknown_preserved() {
        let ext = Extension::parse("SIZE 52428800");
        assert_eq!(ext, Extension::Unknown("SIZE 52428800".to_string()));
    }

    #[test]
    fn parse_empty() {
        assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
    }

    #[test]
    fn mechanism_round_trip() {
        for mech in [AuthMechanism::Plain, AuthMechanism::Login] {
            assert_eq!(AuthMechanism::parse(mech.as_str()), Some(mech));
        }
        assert_eq!(AuthMechanism::parse("XOAUTH2"), None);
    }
}
