//! MAIL FROM parameter flags.

/// Parameter keys the engine retains from a MAIL FROM line.
///
/// Anything outside this set is silently discarded; an unknown parameter
/// never fails the command.
pub const RECOGNISED_KEYS: [&str; 8] = [
    "SIZE", "BODY", "SMTPUTF8", "AUTH", "RET", "ENVID", "NOTIFY", "ORCPT",
];

/// A `KEY` or `KEY=VALUE` parameter attached to MAIL FROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter key, uppercased.
    pub key: String,
    /// Parameter value; empty for bare keys.
    pub value: String,
}

impl Param {
    /// Creates a parameter, uppercasing the key and trimming the value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into().to_ascii_uppercase(),
            value: value.into().trim().to_string(),
        }
    }

    /// Returns true if the key belongs to the recognised set.
    #[must_use]
    pub fn is_recognised(&self) -> bool {
        RECOGNISED_KEYS.contains(&self.key.as_str())
    }
}

/// Parses the parameter tail of a MAIL FROM line.
///
/// The tail is split on whitespace; each word is taken as `KEY` or
/// `KEY=VALUE`. Keys are uppercased, values kept as-is apart from trimming.
/// Unrecognised keys are dropped; duplicates are allowed and order is
/// preserved.
#[must_use]
pub fn parse_params(tail: &str) -> Vec<Param> {
    tail.split_whitespace()
        .map(|word| match word.split_once('=') {
            Some((key, value)) => Param::new(key, value),
            None => Param::new(word, ""),
        })
        .filter(Param::is_recognised)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs() {
        let params = parse_params("SIZE=12345 BODY=8BITMIME");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], Param::new("SIZE", "12345"));
        assert_eq!(params[1], Param::new("BODY", "8BITMIME"));
    }

    #[test]
    fn bare_keys() {
        let params = parse_params("SMTPUTF8");
        assert_eq!(params, vec![Param::new("SMTPUTF8", "")]);
    }

    #[test]
    fn keys_are_uppercased_values_kept() {
        let params = parse_params("body=8bitmime");
        assert_eq!(params[0].key, "BODY");
        assert_eq!(params[0].value, "8bitmime");
    }

    #[test]
    fn unknown_keys_discarded() {
        let params = parse_params("SIZE=1 X-CUSTOM=2 FROB");
        assert_eq!(params, vec![Param::new("SIZE", "1")]);
    }

    #[test]
    fn duplicates_and_order_preserved() {
        let params = parse_params("NOTIFY=SUCCESS NOTIFY=FAILURE");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].value, "SUCCESS");
        assert_eq!(params[1].value, "FAILURE");
    }

    #[test]
    fn empty_tail() {
        assert!(parse_params("").is_empty());
        assert!(parse_params("   ").is_empty());
    }
}
