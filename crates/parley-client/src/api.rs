//! HTTP implementation of the backend contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn, Instrument};

use parley_config::ApiConfig;
use parley_core::{
    AuthBackend, BackendError, BackendResult, ChatBackend, Conversation, ConversationId,
    Credential, Message, Profile, UsageSnapshot,
};
use parley_observability::endpoint_span;

use crate::contracts::{
    ChatResponse, CheckoutResponse, CountResponse, CreateChatBody, CredentialsBody, ErrorBody,
    MessageResponse, RenameBody, SendBody, SendResponse, TokenResponse, UserResponse,
};

/// Client for the chat backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credential: Option<Credential>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: None,
        })
    }

    pub fn from_config(config: &ApiConfig) -> BackendResult<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Attach the bearer credential used by every chat endpoint
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_headers(&self, authenticated: bool) -> BackendResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if authenticated {
            let credential = self.credential.as_ref().ok_or(BackendError::Unauthorized)?;
            let value = HeaderValue::from_str(&credential.bearer())
                .map_err(|_| BackendError::Unauthorized)?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    fn request(&self, method: Method, path: &str, authenticated: bool) -> BackendResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.url(path))
            .headers(self.build_headers(authenticated)?))
    }

    /// Send and map non-success statuses onto [`BackendError`]
    async fn execute(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Response received");

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
            StatusCode::PAYMENT_REQUIRED => Err(BackendError::QuotaExceeded),
            _ => {
                let text = response.text().await.unwrap_or_default();
                let detail = serde_json::from_str::<ErrorBody>(&text)
                    .map(|body| body.message())
                    .unwrap_or(text);
                warn!(status = status.as_u16(), "Backend error: {}", detail);
                Err(BackendError::Api {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| BackendError::malformed(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let request = self.request(Method::GET, path, true)?;
        let response = self.execute(request).await?;
        Self::read_json(response).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        authenticated: bool,
    ) -> BackendResult<T> {
        let request = self.request(method, path, authenticated)?.json(body);
        let response = self.execute(request).await?;
        Self::read_json(response).await
    }

    async fn exchange_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> BackendResult<Credential> {
        let body = CredentialsBody { email, password };
        let token: TokenResponse = self
            .send_json(Method::POST, path, &body, false)
            .instrument(endpoint_span("POST", path))
            .await?;

        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                warn!("Unexpected token type '{}'", kind);
            }
        }

        Credential::new(token.access_token)
            .ok_or_else(|| BackendError::malformed("empty or malformed access token"))
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> BackendResult<Credential> {
        self.exchange_credentials("/token", email, password).await
    }

    async fn register(&self, email: &str, password: &str) -> BackendResult<Credential> {
        self.exchange_credentials("/register", email, password).await
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn profile(&self) -> BackendResult<Profile> {
        let user: UserResponse = self
            .get("/user")
            .instrument(endpoint_span("GET", "/user"))
            .await?;
        Ok(user.into())
    }

    async fn list_conversations(&self) -> BackendResult<Vec<Conversation>> {
        let chats: Vec<ChatResponse> = self
            .get("/chats")
            .instrument(endpoint_span("GET", "/chats"))
            .await?;
        Ok(chats.into_iter().map(Conversation::from).collect())
    }

    async fn create_conversation(&self, title: Option<&str>) -> BackendResult<Conversation> {
        let body = CreateChatBody { title };
        let chat: ChatResponse = self
            .send_json(Method::POST, "/chats", &body, true)
            .instrument(endpoint_span("POST", "/chats"))
            .await?;
        Ok(chat.into())
    }

    async fn rename_conversation(&self, id: &ConversationId, title: &str) -> BackendResult<String> {
        let path = format!("/chats/{}", id);
        let chat: ChatResponse = self
            .send_json(Method::PATCH, &path, &RenameBody { title }, true)
            .instrument(endpoint_span("PATCH", &path))
            .await?;
        Ok(chat.title)
    }

    async fn all_messages(&self) -> BackendResult<Vec<Message>> {
        let messages: Vec<MessageResponse> = self
            .get("/messages")
            .instrument(endpoint_span("GET", "/messages"))
            .await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn conversation_messages(&self, id: &ConversationId) -> BackendResult<Vec<Message>> {
        let path = format!("/chats/{}/messages", id);
        let messages: Vec<MessageResponse> = self
            .get(&path)
            .instrument(endpoint_span("GET", &path))
            .await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn send_message(&self, id: &ConversationId, content: &str) -> BackendResult<String> {
        let path = format!("/chats/{}/messages", id);
        let response: SendResponse = self
            .send_json(Method::POST, &path, &SendBody { content }, true)
            .instrument(endpoint_span("POST", &path))
            .await?;

        match response.bot_message {
            Some(reply) => Ok(reply),
            None if response.upgrade_required => {
                debug!(
                    count = ?response.current_count,
                    time_frame = ?response.time_frame,
                    "Quota rejection in a success response"
                );
                Err(BackendError::QuotaExceeded)
            }
            None => Err(BackendError::malformed(
                response
                    .detail
                    .unwrap_or_else(|| "response has no bot_message".to_string()),
            )),
        }
    }

    async fn usage(&self) -> BackendResult<UsageSnapshot> {
        let count: CountResponse = self
            .get("/message-count")
            .instrument(endpoint_span("GET", "/message-count"))
            .await?;
        Ok(count.into())
    }

    async fn create_checkout_session(&self) -> BackendResult<String> {
        let checkout: CheckoutResponse = self
            .send_json(Method::POST, "/create-checkout-session", &serde_json::json!({}), true)
            .instrument(endpoint_span("POST", "/create-checkout-session"))
            .await?;

        let raw = checkout
            .url
            .ok_or_else(|| BackendError::malformed("no url in checkout response"))?;
        let url = Url::parse(&raw).map_err(|e| BackendError::malformed(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BackendError::malformed(format!(
                "unsupported checkout url scheme '{}'",
                url.scheme()
            )));
        }
        Ok(url.to_string())
    }
}
