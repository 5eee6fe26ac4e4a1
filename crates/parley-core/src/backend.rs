//! The seam between client state and the remote chat service.
//!
//! `parley-client` provides the HTTP implementation; tests script their own.

use async_trait::async_trait;

use crate::session::Credential;
use crate::types::{Conversation, ConversationId, Message, Profile, UsageSnapshot};

/// Failure of a single backend call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session expired or invalid")]
    Unauthorized,

    #[error("Message limit reached")]
    QuotaExceeded,

    #[error("HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Backend-provided `detail`, if the failure carried one
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Api { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Unauthenticated endpoints
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /token`
    async fn login(&self, email: &str, password: &str) -> BackendResult<Credential>;

    /// `POST /register`
    async fn register(&self, email: &str, password: &str) -> BackendResult<Credential>;
}

/// Bearer-authenticated endpoints
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `GET /user`
    async fn profile(&self) -> BackendResult<Profile>;

    /// `GET /chats`
    async fn list_conversations(&self) -> BackendResult<Vec<Conversation>>;

    /// `POST /chats`; `None` lets the backend pick the title
    async fn create_conversation(&self, title: Option<&str>) -> BackendResult<Conversation>;

    /// `PATCH /chats/{id}`, returns the stored title
    async fn rename_conversation(&self, id: &ConversationId, title: &str) -> BackendResult<String>;

    /// `GET /messages` (every message of the user, across conversations)
    async fn all_messages(&self) -> BackendResult<Vec<Message>>;

    /// `GET /chats/{id}/messages`
    async fn conversation_messages(&self, id: &ConversationId) -> BackendResult<Vec<Message>>;

    /// `POST /chats/{id}/messages`, returns the bot reply.
    ///
    /// An exhausted quota is reported as [`BackendError::QuotaExceeded`].
    async fn send_message(&self, id: &ConversationId, content: &str) -> BackendResult<String>;

    /// `GET /message-count`
    async fn usage(&self) -> BackendResult<UsageSnapshot>;

    /// `POST /create-checkout-session`, returns the hosted checkout URL
    async fn create_checkout_session(&self) -> BackendResult<String>;
}
