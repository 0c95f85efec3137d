//! Core SMTP types: reply codes, verbs, extensions, parameters, mailboxes.

mod address;
mod extension;
mod params;
mod reply;
mod verb;

pub use address::Mailbox;
pub use extension::{AuthMechanism, Extension};
pub use params::{parse_params, Param, RECOGNISED_KEYS};
pub use reply::{canned, Reply, ReplyBuilder, ReplyCode};
pub use verb::Verb;
