//! HTTP access to the chat endpoints: history, send, mark-read.
//!
//! The trait seam lets sessions run against a test double; the reqwest
//! implementation talks to the real API and unwraps its response envelope.

use async_trait::async_trait;
use common::payload::ChatMessagePayload;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Conversation history, ascending by creation time.
    async fn list_messages(&self, ticket_id: i64) -> Result<Vec<ChatMessagePayload>, ApiError>;

    /// Persist a message; the server broadcasts it after commit.
    async fn send_message(
        &self,
        ticket_id: i64,
        body: &str,
    ) -> Result<ChatMessagePayload, ApiError>;

    /// Mark all unread messages not authored by the caller as read.
    async fn mark_read(&self, ticket_id: i64) -> Result<(), ApiError>;
}

/// The standard `{success, data, message}` envelope every endpoint answers with.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

pub struct HttpChatApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpChatApi {
    /// `base_url` without trailing slash, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn chat_url(&self, ticket_id: i64) -> String {
        format!("{}/api/tickets/{}/chat", self.base_url, ticket_id)
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("message")?.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ApiError::Rejected(message));
        }

        let envelope: Envelope<T> = resp.json().await?;
        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope.message.unwrap_or_else(|| "request failed".into()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::Rejected("response carried no data".into()))
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_messages(&self, ticket_id: i64) -> Result<Vec<ChatMessagePayload>, ApiError> {
        let resp = self
            .http
            .get(self.chat_url(ticket_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn send_message(
        &self,
        ticket_id: i64,
        body: &str,
    ) -> Result<ChatMessagePayload, ApiError> {
        let resp = self
            .http
            .post(self.chat_url(ticket_id))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "message": body }))
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn mark_read(&self, ticket_id: i64) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(format!("{}/mark-read", self.chat_url(ticket_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse::<serde_json::Value>(resp).await?;
        Ok(())
    }
}
