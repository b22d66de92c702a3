//! Inbound message types.
//!
//! Adapters normalize whatever their platform delivers into one [`Message`]
//! variant. Branches match on the variant and its content; the engine never
//! looks past what is modeled here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::nlu::NluResults;
use crate::user::User;

/// Fallback id for messages the platform did not stamp.
fn next_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    format!("message_{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// One inbound event from a platform adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// A user said something.
    Text {
        /// Who sent it.
        user: User,
        /// Platform message id.
        id: String,
        /// What was said.
        text: String,
        /// Results attached by the understand stage, when NLU ran.
        nlu: Option<NluResults>,
    },

    /// A user entered a room.
    Enter {
        /// Who entered.
        user: User,
        /// Platform event id.
        id: String,
    },

    /// A user left a room.
    Leave {
        /// Who left.
        user: User,
        /// Platform event id.
        id: String,
    },

    /// A room's topic changed.
    Topic {
        /// Who changed it.
        user: User,
        /// Platform event id.
        id: String,
        /// The new topic.
        text: String,
    },

    /// A structured payload a platform renders natively (cards, buttons).
    Rich {
        /// Who triggered it.
        user: User,
        /// Platform event id.
        id: String,
        /// The platform payload.
        payload: Value,
    },

    /// Data pushed from an integration rather than said by a person.
    Server {
        /// The acting identity.
        user: User,
        /// Event id.
        id: String,
        /// Arbitrary payload, queried by server branches via dot paths.
        data: Value,
    },

    /// Wrapper applied when nothing else matched, so catch-all branches can
    /// tell a fallback pass from a first pass.
    CatchAll(Box<Message>),
}

impl Message {
    /// Create a text message with a generated id.
    #[must_use]
    pub fn text(user: User, text: impl Into<String>) -> Self {
        Self::Text {
            user,
            id: next_id(),
            text: text.into(),
            nlu: None,
        }
    }

    /// Create an enter event with a generated id.
    #[must_use]
    pub fn enter(user: User) -> Self {
        Self::Enter {
            user,
            id: next_id(),
        }
    }

    /// Create a leave event with a generated id.
    #[must_use]
    pub fn leave(user: User) -> Self {
        Self::Leave {
            user,
            id: next_id(),
        }
    }

    /// Create a topic change event with a generated id.
    #[must_use]
    pub fn topic(user: User, text: impl Into<String>) -> Self {
        Self::Topic {
            user,
            id: next_id(),
            text: text.into(),
        }
    }

    /// Create a rich message with a generated id.
    #[must_use]
    pub fn rich(user: User, payload: Value) -> Self {
        Self::Rich {
            user,
            id: next_id(),
            payload,
        }
    }

    /// Create a server-data message with a generated id.
    #[must_use]
    pub fn server(user: User, data: Value) -> Self {
        Self::Server {
            user,
            id: next_id(),
            data,
        }
    }

    /// The sending user. Catch-all wrappers delegate to the wrapped message.
    #[must_use]
    pub fn user(&self) -> &User {
        match self {
            Self::Text { user, .. }
            | Self::Enter { user, .. }
            | Self::Leave { user, .. }
            | Self::Topic { user, .. }
            | Self::Rich { user, .. }
            | Self::Server { user, .. } => user,
            Self::CatchAll(inner) => inner.user(),
        }
    }

    /// The message id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Text { id, .. }
            | Self::Enter { id, .. }
            | Self::Leave { id, .. }
            | Self::Topic { id, .. }
            | Self::Rich { id, .. }
            | Self::Server { id, .. } => id,
            Self::CatchAll(inner) => inner.id(),
        }
    }

    /// The spoken text, for text-bearing variants.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } | Self::Topic { text, .. } => Some(text),
            Self::CatchAll(inner) => inner.text_content(),
            _ => None,
        }
    }

    /// Attached NLU results, when the understand stage ran.
    #[must_use]
    pub fn nlu(&self) -> Option<&NluResults> {
        match self {
            Self::Text { nlu, .. } => nlu.as_ref(),
            Self::CatchAll(inner) => inner.nlu(),
            _ => None,
        }
    }

    /// Attach NLU results. Only text messages hold them.
    pub fn set_nlu(&mut self, results: NluResults) {
        match self {
            Self::Text { nlu, .. } => *nlu = Some(results),
            Self::CatchAll(inner) => inner.set_nlu(results),
            _ => {}
        }
    }

    /// The server payload, for server-data messages.
    #[must_use]
    pub fn server_data(&self) -> Option<&Value> {
        match self {
            Self::Server { data, .. } => Some(data),
            Self::CatchAll(inner) => inner.server_data(),
            _ => None,
        }
    }

    /// True when this is the nothing-else-matched wrapper.
    #[must_use]
    pub const fn is_catch_all(&self) -> bool {
        matches!(self, Self::CatchAll(_))
    }

    /// The wrapped message, when this is a catch-all wrapper.
    #[must_use]
    pub fn catch_all_inner(&self) -> Option<&Message> {
        match self {
            Self::CatchAll(inner) => Some(inner),
            _ => None,
        }
    }

    /// Wrap in the catch-all marker. Already-wrapped messages stay single.
    #[must_use]
    pub fn into_catch_all(self) -> Self {
        if self.is_catch_all() {
            self
        } else {
            Self::CatchAll(Box::new(self))
        }
    }

    /// Short variant name for log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Enter { .. } => "enter",
            Self::Leave { .. } => "leave",
            Self::Topic { .. } => "topic",
            Self::Rich { .. } => "rich",
            Self::Server { .. } => "server",
            Self::CatchAll(_) => "catch_all",
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { text, .. } | Self::Topic { text, .. } => write!(f, "{text}"),
            Self::Enter { user, .. } => write!(f, "{} entered", user.id),
            Self::Leave { user, .. } => write!(f, "{} left", user.id),
            Self::Rich { .. } => write!(f, "(rich message)"),
            Self::Server { .. } => write!(f, "(server data)"),
            Self::CatchAll(inner) => inner.fmt(f),
        }
    }
}
