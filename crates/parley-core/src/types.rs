//! Domain types shared by the state stores and the backend seam.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Backend-assigned conversation identifier.
///
/// The backend hands out integers today, but the client treats the id as
/// opaque and accepts either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<i32> for ConversationId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ConversationId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for ConversationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Ok(Self(id.to_string())),
            RawId::Str(id) if !id.trim().is_empty() => Ok(Self(id)),
            RawId::Str(_) => Err(serde::de::Error::custom("conversation id cannot be empty")),
        }
    }
}

/// Conversation summary as listed in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
}

impl Conversation {
    pub fn new(id: impl Into<ConversationId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub is_bot: bool,
    /// Server timestamp; absent for optimistic and synthetic entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<NaiveDateTime>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_bot: false,
            sent_at: None,
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_bot: true,
            sent_at: None,
        }
    }

    pub fn with_sent_at(mut self, sent_at: Option<NaiveDateTime>) -> Self {
        self.sent_at = sent_at;
        self
    }
}

/// Subset of the user profile the client consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub is_premium: bool,
}

/// Authoritative usage count for the current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub current_count: u32,
    pub time_frame: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_accepts_numbers_and_strings() {
        let from_int: ConversationId = serde_json::from_str("42").unwrap();
        let from_str: ConversationId = serde_json::from_str("\"c-7\"").unwrap();

        assert_eq!(from_int.as_str(), "42");
        assert_eq!(from_str.to_string(), "c-7");
        assert!(serde_json::from_str::<ConversationId>("\"  \"").is_err());
        assert!(serde_json::from_str::<ConversationId>("null").is_err());
    }

    #[test]
    fn test_message_constructors() {
        let user = Message::user("hi");
        let bot = Message::bot("hello");

        assert!(!user.is_bot);
        assert!(bot.is_bot);
        assert!(user.sent_at.is_none());
    }
}
