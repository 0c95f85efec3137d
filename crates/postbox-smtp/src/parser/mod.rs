//! Wire-format parsers: replies, angle-bracket addresses, header address
//! lists.

use crate::error::{Error, Result};
use crate::types::{Mailbox, Reply, ReplyCode};

/// Parses an SMTP reply from its wire lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK`
/// - Multi: `250-First line` / `250-Second line` / `250 Last line`
///
/// The code is taken from the first line; message text is collected from
/// every line.
///
/// # Errors
///
/// Returns an error if the reply is empty or a line is too short to carry
/// a code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("empty reply".into()));
    };

    if first.len() < 3 {
        return Err(Error::Protocol(format!("reply too short: {first:?}")));
    }

    let code = first[..3]
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("invalid reply code: {:?}", &first[..3])))?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if line.len() > 4 {
            message.push(line[4..].to_string());
        } else if line.len() >= 3 {
            message.push(String::new());
        } else {
            return Err(Error::Protocol(format!("malformed reply line: {line:?}")));
        }
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Checks if a line terminates a multi-line reply.
///
/// The separator is the fourth byte: `-` continues the reply, a space (or
/// end-of-line) marks the terminal line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    !matches!(line.as_bytes().get(3), Some(b'-'))
}

/// Extracts the bare address from an angle-bracketed parameter string.
///
/// Locates the outermost `<` and the next `>`, returning the interior
/// trimmed of whitespace. Yields an empty string when either bracket is
/// missing. Deliberately permissive: any characters between the brackets
/// are accepted, semantic validation is the verifier's job.
#[must_use]
pub fn extract_addr(s: &str) -> String {
    let Some(open) = s.find('<') else {
        return String::new();
    };
    let Some(close) = s[open..].find('>') else {
        return String::new();
    };
    s[open + 1..open + close].trim().to_string()
}

/// Splits a named-address header value into mailboxes.
///
/// The value is split on `,` at the top level (comment groups are not
/// handled). Each entry is decomposed into display name and address at the
/// last whitespace run; double quotes around the display name are stripped.
/// Entries without angle brackets are taken as bare addresses.
#[must_use]
pub fn parse_named_addresses(value: &str) -> Vec<Mailbox> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Mailbox {
    let boundary = entry
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .next_back();

    let (name, addr_part) = match boundary {
        Some((idx, c)) => (entry[..idx].trim(), entry[idx + c.len_utf8()..].trim()),
        None => ("", entry),
    };

    let address = if addr_part.contains('<') {
        extract_addr(addr_part)
    } else {
        addr_part.to_string()
    };

    let name = name.replace('"', "");
    let name = name.trim();
    if name.is_empty() {
        Mailbox::new(address)
    } else {
        Mailbox::with_name(name, address)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod reply_parsing {
        use super::*;

        #[test]
        fn single_line() {
            let lines = vec!["250 OK".to_string()];
            let reply = parse_reply(&lines).unwrap();
            assert_eq!(reply.code.as_u16(), 250);
            assert_eq!(reply.message, vec!["OK"]);
        }

        #[test]
        fn multi_line() {
            let lines = vec![
                "250-mail.example Hello".to_string(),
                "250-STARTTLS".to_string(),
                "250 OK".to_string(),
            ];
            let reply = parse_reply(&lines).unwrap();
            assert_eq!(reply.code.as_u16(), 250);
            assert_eq!(reply.message, vec!["mail.example Hello", "STARTTLS", "OK"]);
        }

        #[test]
        fn bare_code_line() {
            let lines = vec!["250".to_string()];
            let reply = parse_reply(&lines).unwrap();
            assert_eq!(reply.message, vec![""]);
        }

        #[test]
        fn rejects_empty_and_malformed() {
            assert!(parse_reply(&[]).is_err());
            assert!(parse_reply(&["25".to_string()]).is_err());
            assert!(parse_reply(&["ABC OK".to_string()]).is_err());
        }

        #[test]
        fn last_line_detection() {
            assert!(is_last_reply_line("250 OK"));
            assert!(!is_last_reply_line("250-Continuing"));
            assert!(is_last_reply_line("250"));
        }
    }

    mod address_extraction {
        use super::*;

        #[test]
        fn strips_brackets() {
            assert_eq!(extract_addr("MAIL FROM:<a@x.example>"), "a@x.example");
            assert_eq!(extract_addr("<a@x.example>"), "a@x.example");
        }

        #[test]
        fn trims_interior_whitespace() {
            assert_eq!(extract_addr("< a@x.example >"), "a@x.example");
        }

        #[test]
        fn empty_on_missing_bracket() {
            assert_eq!(extract_addr("a@x.example"), "");
            assert_eq!(extract_addr("<a@x.example"), "");
            assert_eq!(extract_addr("a@x.example>"), "");
        }

        #[test]
        fn permissive_interior() {
            assert_eq!(extract_addr("<not really an address>"), "not really an address");
            assert_eq!(extract_addr("<>"), "");
        }

        #[test]
        fn outermost_open_bracket_wins() {
            assert_eq!(extract_addr("x <a@x.example> y <b@y.example>"), "a@x.example");
        }
    }

    mod named_addresses {
        use super::*;

        #[test]
        fn single_bracketed() {
            let list = parse_named_addresses("<a@x.example>");
            assert_eq!(list, vec![Mailbox::new("a@x.example")]);
        }

        #[test]
        fn single_bare() {
            let list = parse_named_addresses("a@x.example");
            assert_eq!(list, vec![Mailbox::new("a@x.example")]);
        }

        #[test]
        fn name_and_address() {
            let list = parse_named_addresses("Ann Example <ann@x.example>");
            assert_eq!(list, vec![Mailbox::with_name("Ann Example", "ann@x.example")]);
        }

        #[test]
        fn quoted_name_stripped() {
            let list = parse_named_addresses("\"Ann Example\" <ann@x.example>");
            assert_eq!(list, vec![Mailbox::with_name("Ann Example", "ann@x.example")]);
        }

        #[test]
        fn comma_separated_list() {
            let list = parse_named_addresses("a@x.example, \"B\" <b@y.example>, <c@z.example>");
            assert_eq!(
                list,
                vec![
                    Mailbox::new("a@x.example"),
                    Mailbox::with_name("B", "b@y.example"),
                    Mailbox::new("c@z.example"),
                ]
            );
        }

        #[test]
        fn empty_entries_skipped() {
            let list = parse_named_addresses("a@x.example, , b@y.example");
            assert_eq!(list.len(), 2);
        }

        #[test]
        fn empty_value() {
            assert!(parse_named_addresses("").is_empty());
        }
    }
}
