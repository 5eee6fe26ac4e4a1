//! Request and response bodies of the chat backend.
//!
//! Responses are parsed here and converted to domain types; anything that
//! does not fit is rejected rather than guessed at.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use parley_core::{Conversation, ConversationId, Message, Profile, UsageSnapshot};

/// Body of `POST /token` and `POST /register`
#[derive(Debug, Serialize)]
pub struct CredentialsBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// `GET /user`
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub email: Option<String>,
    pub is_premium: bool,
}

impl From<UserResponse> for Profile {
    fn from(user: UserResponse) -> Self {
        Profile {
            is_premium: user.is_premium,
        }
    }
}

/// A chat row; extra columns such as `user_id` are ignored
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub id: ConversationId,
    pub title: String,
}

impl From<ChatResponse> for Conversation {
    fn from(chat: ChatResponse) -> Self {
        Conversation {
            id: chat.id,
            title: chat.title,
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct CreateChatBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct RenameBody<'a> {
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub content: String,
    pub is_bot: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<NaiveDateTime>,
}

impl From<MessageResponse> for Message {
    fn from(message: MessageResponse) -> Self {
        Message {
            content: message.content,
            is_bot: message.is_bot,
            sent_at: message.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendBody<'a> {
    pub content: &'a str,
}

/// `POST /chats/{id}/messages`.
///
/// A quota rejection may also arrive with a success status, carrying
/// `upgrade_required` and no `bot_message`.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub bot_message: Option<String>,
    #[serde(default)]
    pub upgrade_required: bool,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub current_count: Option<u32>,
    #[serde(default)]
    pub time_frame: Option<String>,
}

/// `GET /message-count`
#[derive(Debug, Deserialize)]
pub struct CountResponse {
    pub current_count: u32,
    pub time_frame: String,
}

impl From<CountResponse> for UsageSnapshot {
    fn from(count: CountResponse) -> Self {
        UsageSnapshot {
            current_count: count.current_count,
            time_frame: count.time_frame,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutResponse {
    #[serde(default)]
    pub url: Option<String>,
}

/// Error body; validation errors carry a list instead of a string
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Naive or offset timestamps; anything unparsable is dropped
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| {
        raw.parse::<NaiveDateTime>()
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(&raw).ok().map(|dt| dt.naive_utc()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_timestamps() {
        let naive: MessageResponse = serde_json::from_str(
            r#"{"content":"hi","is_bot":false,"timestamp":"2024-03-01T10:15:30.123456"}"#,
        )
        .unwrap();
        assert!(naive.timestamp.is_some());

        let offset: MessageResponse = serde_json::from_str(
            r#"{"content":"hi","is_bot":true,"timestamp":"2024-03-01T10:15:30Z"}"#,
        )
        .unwrap();
        assert!(offset.timestamp.is_some());

        let missing: MessageResponse =
            serde_json::from_str(r#"{"content":"hi","is_bot":true}"#).unwrap();
        assert!(missing.timestamp.is_none());

        let garbage: MessageResponse =
            serde_json::from_str(r#"{"content":"hi","is_bot":true,"timestamp":"yesterday"}"#)
                .unwrap();
        assert!(garbage.timestamp.is_none());
    }

    #[test]
    fn test_chat_row_ignores_extra_columns() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"id":3,"title":"New Chat","user_id":9,"created_at":"2024-03-01T10:15:30"}"#,
        )
        .unwrap();
        let conversation = Conversation::from(chat);
        assert_eq!(conversation.id.as_str(), "3");
        assert_eq!(conversation.title, "New Chat");
    }

    #[test]
    fn test_error_detail_shapes() {
        let plain: ErrorBody = serde_json::from_str(r#"{"detail":"Chat not found"}"#).unwrap();
        assert_eq!(plain.message(), "Chat not found");

        let list: ErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["body","title"],"msg":"field required"}]}"#)
                .unwrap();
        assert!(list.message().contains("field required"));
    }

    #[test]
    fn test_create_body_omits_missing_title() {
        let body = serde_json::to_string(&CreateChatBody::default()).unwrap();
        assert_eq!(body, "{}");
    }
}
