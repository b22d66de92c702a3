//! Outgoing envelopes.
//!
//! An envelope is everything the respond stage hands to a message adapter:
//! addressing, text strings, an optional structured payload, and the
//! adapter method to dispatch with. The core never renders platform wire
//! formats; adapters translate payloads on their side of the seam.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::user::{Room, User};

/// Default dispatch method.
pub const DEFAULT_METHOD: &str = "send";

fn next_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    format!("envelope_{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// An outgoing message: address + content + dispatch method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope id, for adapter-side deduplication.
    pub id: String,

    /// Target room, when addressed to one.
    pub room: Option<Room>,

    /// Target user, when addressed to one.
    pub user: Option<User>,

    /// Text strings to send, in order.
    pub strings: Vec<String>,

    /// Structured payload (attachments, quick replies).
    pub payload: Option<Payload>,

    /// Adapter method to dispatch with (`send`, `emote`, `react`, ...).
    pub method: String,

    /// Set once the respond stage has handed this envelope to the adapter.
    sent: bool,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    /// Create an unaddressed envelope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: next_id(),
            room: None,
            user: None,
            strings: Vec::new(),
            payload: None,
            method: DEFAULT_METHOD.to_string(),
            sent: false,
        }
    }

    /// Create an envelope addressed back at a message's user and room.
    #[must_use]
    pub fn reply_to(message: &Message) -> Self {
        let user = message.user().clone();
        let room = user.room.clone();
        Self {
            user: Some(user),
            room,
            ..Self::new()
        }
    }

    /// Address to a user.
    #[must_use]
    pub fn to_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Address to a room.
    #[must_use]
    pub fn to_room(mut self, room: Room) -> Self {
        self.room = Some(room);
        self
    }

    /// Append one string of content.
    #[must_use]
    pub fn write(mut self, text: impl Into<String>) -> Self {
        self.strings.push(text.into());
        self
    }

    /// Append several strings of content.
    #[must_use]
    pub fn compose<I, S>(mut self, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strings.extend(strings.into_iter().map(Into::into));
        self
    }

    /// Attach a payload part.
    #[must_use]
    pub fn attach(mut self, attachment: Value) -> Self {
        self.payload
            .get_or_insert_with(Payload::default)
            .attachments
            .push(attachment);
        self
    }

    /// Set the dispatch method.
    #[must_use]
    pub fn via(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// True once dispatched by the respond stage.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        self.sent
    }

    /// Mark as handed to the adapter.
    pub(crate) fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// True when the envelope carries no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.payload.as_ref().is_none_or(Payload::is_empty)
    }
}

/// Structured envelope content, pre-wire-format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Attachment objects in the adapter's vocabulary.
    pub attachments: Vec<Value>,

    /// Quick-reply objects in the adapter's vocabulary.
    pub quick_replies: Vec<Value>,
}

impl Payload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attachment.
    #[must_use]
    pub fn attachment(mut self, value: Value) -> Self {
        self.attachments.push(value);
        self
    }

    /// Append a quick reply.
    #[must_use]
    pub fn quick_reply(mut self, value: Value) -> Self {
        self.quick_replies.push(value);
        self
    }

    /// True when no parts are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty() && self.quick_replies.is_empty()
    }
}
