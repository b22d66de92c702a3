//! User and room identities.
//!
//! Platform adapters attach these to every inbound message. The engine only
//! ever reads ids and names; anything richer stays on the adapter side.

use serde::{Deserialize, Serialize};

/// A person (or integration) the bot is talking with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Platform-scoped unique id.
    pub id: String,

    /// Display name, when the platform provides one.
    pub name: Option<String>,

    /// The room the user was seen in, when known.
    pub room: Option<Room>,
}

impl User {
    /// Create a user with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            room: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the room.
    #[must_use]
    pub fn room(mut self, room: Room) -> Self {
        self.room = Some(room);
        self
    }

    /// The room id, or an empty string when the user has no room.
    ///
    /// Audience keys use the empty segment so direct-message users without a
    /// room still get stable keys.
    #[must_use]
    pub fn room_id(&self) -> &str {
        self.room.as_ref().map_or("", |room| room.id.as_str())
    }
}

/// A channel, group or direct-message container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Platform-scoped unique id.
    pub id: String,

    /// Display name, when the platform provides one.
    pub name: Option<String>,
}

impl Room {
    /// Create a room with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_builder() {
        let user = User::new("u1").name("jo").room(Room::new("general"));
        assert_eq!(user.id, "u1");
        assert_eq!(user.name.as_deref(), Some("jo"));
        assert_eq!(user.room_id(), "general");
    }

    #[test]
    fn roomless_user_has_empty_room_id() {
        assert_eq!(User::new("u1").room_id(), "");
    }
}
