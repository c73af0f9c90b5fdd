use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Other { kind: String },
}

/// A thread message as listed by the assistant service. `created_at` is unix seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub created_at: i64,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            ContentPart::Text(text) => Some(text.as_str()),
            ContentPart::Other { .. } => None,
        })
    }
}

/// Outbound message body used when creating threads and runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}
