//! Message value: envelope plus captured payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Param;

/// A mail message as the engines see it.
///
/// The envelope (`from`, `to`) drives routing; `cc`/`bcc` are populated from
/// headers during DATA capture on the server side and drive extra RCPT
/// commands on the client side. Insertion order is preserved for every
/// list-typed field, and duplicate flags are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    flags: Vec<Param>,
    subject: String,
    data: String,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the envelope sender.
    pub fn set_from(&mut self, from: impl Into<String>) -> &mut Self {
        self.from = from.into();
        self
    }

    /// Appends a primary recipient.
    pub fn append_to(&mut self, to: impl Into<String>) -> &mut Self {
        self.to.push(to.into());
        self
    }

    /// Appends a carbon-copy recipient.
    pub fn append_cc(&mut self, cc: impl Into<String>) -> &mut Self {
        self.cc.push(cc.into());
        self
    }

    /// Appends a blind carbon-copy recipient.
    pub fn append_bcc(&mut self, bcc: impl Into<String>) -> &mut Self {
        self.bcc.push(bcc.into());
        self
    }

    /// Appends an extension flag from MAIL FROM parameters.
    pub fn append_flag(&mut self, flag: Param) -> &mut Self {
        self.flags.push(flag);
        self
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = subject.into();
        self
    }

    /// Sets the captured payload (folded headers, blank separator, body).
    pub fn set_data(&mut self, data: impl Into<String>) -> &mut Self {
        self.data = data.into();
        self
    }

    /// Returns the envelope sender.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Returns the primary recipients.
    #[must_use]
    pub fn to(&self) -> &[String] {
        &self.to
    }

    /// Returns the carbon-copy recipients.
    #[must_use]
    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    /// Returns the blind carbon-copy recipients.
    #[must_use]
    pub fn bcc(&self) -> &[String] {
        &self.bcc
    }

    /// Returns the extension flags in insertion order.
    #[must_use]
    pub fn flags(&self) -> &[Param] {
        &self.flags
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the captured payload.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Iterates over every address a delivery needs a RCPT for:
    /// `to`, then `cc`, then `bcc`.
    pub fn all_recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
    }

    /// Discards the envelope and payload, keeping nothing.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Serialises the message to the transport DTO as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&MessageDto::from(self))?)
    }

    /// Builds a message from transport-DTO JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        let dto: MessageDto = serde_json::from_str(json)?;
        Ok(dto.into())
    }
}

/// JSON transport DTO for [`Message`].
///
/// Stable schema used to hand messages across process boundaries:
/// `{from, to[], cc[], bcc[], subject, body, headers{}}`. The `headers`
/// map carries the extension flags; entries with an empty key or value are
/// dropped in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDto {
    /// Envelope sender.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Primary recipients.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    /// Subject line.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// Message body.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Custom headers, mapped onto extension flags.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        let headers = message
            .flags()
            .iter()
            .filter(|flag| !flag.key.is_empty() && !flag.value.is_empty())
            .map(|flag| (flag.key.clone(), flag.value.clone()))
            .collect();

        Self {
            from: message.from().to_string(),
            to: message.to().to_vec(),
            cc: message.cc().to_vec(),
            bcc: message.bcc().to_vec(),
            subject: message.subject().to_string(),
            body: message.data().to_string(),
            headers,
        }
    }
}

impl From<MessageDto> for Message {
    fn from(dto: MessageDto) -> Self {
        let mut message = Self::new();
        message.set_from(dto.from);
        for to in dto.to {
            message.append_to(to);
        }
        for cc in dto.cc {
            message.append_cc(cc);
        }
        for bcc in dto.bcc {
            message.append_bcc(bcc);
        }
        message.set_subject(dto.subject);
        message.set_data(dto.body);
        for (key, value) in dto.headers {
            if !key.is_empty() && !value.is_empty() {
                message.append_flag(Param::new(key, value));
            }
        }
        message
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Message {
        let mut message = Message::new();
        message
            .set_from("a@x.example")
            .append_to("b@y.example")
            .append_to("c@y.example")
            .append_cc("d@z.example")
            .append_bcc("e@z.example")
            .set_subject("Hi")
            .set_data("Subject: Hi\r\n\r\nbody\r\n");
        message
    }

    #[test]
    fn mutators_preserve_insertion_order() {
        let message = sample();
        assert_eq!(message.to(), ["b@y.example", "c@y.example"]);
        assert_eq!(message.cc(), ["d@z.example"]);
        assert_eq!(message.bcc(), ["e@z.example"]);
    }

    #[test]
    fn duplicate_flags_allowed() {
        let mut message = Message::new();
        message.append_flag(Param::new("NOTIFY", "SUCCESS"));
        message.append_flag(Param::new("NOTIFY", "FAILURE"));
        assert_eq!(message.flags().len(), 2);
    }

    #[test]
    fn all_recipients_order() {
        let message = sample();
        let all: Vec<&str> = message.all_recipients().collect();
        assert_eq!(
            all,
            ["b@y.example", "c@y.example", "d@z.example", "e@z.example"]
        );
    }

    #[test]
    fn clear_discards_everything() {
        let mut message = sample();
        message.clear();
        assert_eq!(message, Message::new());
    }

    #[test]
    fn message_json_round_trip() {
        let mut message = sample();
        message.append_flag(Param::new("ENVID", "abc123"));

        let json = message.to_json().unwrap();
        let back = Message::from_json(&json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn dto_round_trip_with_headers() {
        let mut headers = HashMap::new();
        headers.insert("RET".to_string(), "HDRS".to_string());

        let dto = MessageDto {
            from: "a@x.example".to_string(),
            to: vec!["b@y.example".to_string()],
            subject: "Hi".to_string(),
            body: "body".to_string(),
            headers,
            ..MessageDto::default()
        };

        let json = serde_json::to_string(&dto).unwrap();
        let back: MessageDto = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dto);
    }

    #[test]
    fn dto_empty_header_entries_dropped() {
        let mut headers = HashMap::new();
        headers.insert("RET".to_string(), String::new());
        headers.insert(String::new(), "x".to_string());

        let dto = MessageDto {
            headers,
            ..MessageDto::default()
        };
        let message: Message = dto.into();
        assert!(message.flags().is_empty());
    }

    #[test]
    fn dto_missing_fields_default() {
        let message = Message::from_json("{}").unwrap();
        assert_eq!(message, Message::new());
    }
}
