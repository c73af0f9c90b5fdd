use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::LineConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;

/// LINE rejects text messages longer than this many characters.
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply transport error: {0}")]
    Transport(String),
    #[error("reply API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
}

#[async_trait]
pub trait ReplyClient: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError>;
}

pub struct LineReplyClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
}

impl LineReplyClient {
    pub fn new(config: &LineConfig) -> Result<Self, ReplyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| ReplyError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/v2/bot/message/reply", config.api_base_url.trim_end_matches('/')),
            access_token: config.access_token.clone(),
        })
    }
}

pub(crate) fn clamp_text(text: &str) -> String {
    text.chars().take(MAX_TEXT_CHARS).collect()
}

#[async_trait]
impl ReplyClient for LineReplyClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        let body = json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": clamp_text(text) }],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.access_token.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|error| ReplyError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ReplyError::Api { status: status.as_u16(), body })
    }
}
