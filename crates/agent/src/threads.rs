use std::sync::Arc;

use concierge_core::domain::message::NewMessage;
use concierge_core::domain::thread::{ConversationKey, ThreadId};
use concierge_core::errors::{ConversationError, StorageError};
use concierge_db::repositories::ThreadRepository;
use tracing::{info, warn};

use crate::assistant::AssistantClient;

/// Maps a conversation key to its assistant thread, creating one on first contact.
///
/// Two racing first contacts for one key may both create a thread; the store
/// keeps the last write and the other thread is orphaned.
pub struct ThreadResolver {
    repository: Arc<dyn ThreadRepository>,
    client: Arc<dyn AssistantClient>,
    preamble: Option<String>,
    welcome_message: Option<String>,
}

impl ThreadResolver {
    pub fn new(repository: Arc<dyn ThreadRepository>, client: Arc<dyn AssistantClient>) -> Self {
        Self { repository, client, preamble: None, welcome_message: None }
    }

    pub fn with_preamble(mut self, preamble: Option<String>) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn with_welcome_message(mut self, welcome_message: Option<String>) -> Self {
        self.welcome_message = welcome_message;
        self
    }

    pub async fn resolve_or_create(
        &self,
        key: &ConversationKey,
    ) -> Result<ThreadId, ConversationError> {
        if let Some(thread_id) = self.repository.get(key).await.map_err(StorageError::from)? {
            return Ok(thread_id);
        }

        let initial: Vec<NewMessage> =
            self.preamble.iter().map(|preamble| NewMessage::user(preamble.as_str())).collect();
        let thread_id = self
            .client
            .create_thread(&initial)
            .await?;

        if let Some(welcome) = &self.welcome_message {
            if let Err(error) =
                self.client.add_message(&thread_id, &NewMessage::assistant(welcome.as_str())).await
            {
                warn!(
                    event_name = "agent.thread.welcome_failed",
                    thread_id = %thread_id,
                    error = %error,
                    "could not seed welcome message"
                );
            }
        }

        self.repository.put(key, &thread_id).await.map_err(StorageError::from)?;
        info!(
            event_name = "agent.thread.created",
            conversation_key = %key,
            thread_id = %thread_id,
            "created assistant thread for new conversation"
        );
        Ok(thread_id)
    }
}
