use std::sync::Arc;

use concierge_core::config::AssistantConfig;
use concierge_core::domain::message::NewMessage;
use concierge_core::domain::thread::ConversationKey;
use concierge_core::errors::ConversationError;
use concierge_db::repositories::ThreadRepository;
use tracing::{error, info};
use uuid::Uuid;

use crate::assistant::AssistantClient;
use crate::monitor::PollingMonitor;
use crate::reply::latest_reply;
use crate::runtime::RunController;
use crate::threads::ThreadResolver;
use crate::tools::ToolRouter;

/// One conversation turn: thread lookup, run, tool dispatch, reply extraction.
pub struct ConversationService {
    threads: ThreadResolver,
    runs: RunController,
    client: Arc<dyn AssistantClient>,
}

impl ConversationService {
    pub fn new(
        threads: ThreadResolver,
        runs: RunController,
        client: Arc<dyn AssistantClient>,
    ) -> Self {
        Self { threads, runs, client }
    }

    /// Wires the polling monitor and thread seeding from the assistant settings.
    pub fn assemble(
        config: &AssistantConfig,
        client: Arc<dyn AssistantClient>,
        repository: Arc<dyn ThreadRepository>,
        router: ToolRouter,
    ) -> Self {
        let monitor = Arc::new(PollingMonitor::from_config(client.clone(), config));
        let threads = ThreadResolver::new(repository, client.clone())
            .with_preamble(config.thread_preamble.clone())
            .with_welcome_message(config.welcome_message.clone());
        let runs = RunController::new(client.clone(), monitor, Arc::new(router));
        Self::new(threads, runs, client)
    }

    pub async fn respond(
        &self,
        key: &ConversationKey,
        text: &str,
    ) -> Result<String, ConversationError> {
        let thread_id = self.threads.resolve_or_create(key).await?;
        let run = self.runs.start_run(&thread_id, &NewMessage::user(text)).await?;
        let messages = self
            .client
            .list_messages(&thread_id)
            .await?;

        info!(
            event_name = "agent.turn.completed",
            thread_id = %thread_id,
            run_id = %run.id,
            message_count = messages.len(),
            "conversation turn completed"
        );
        Ok(latest_reply(&messages))
    }

    /// Never fails: any error is logged and replaced with the generic apology.
    pub async fn handle(&self, key: &ConversationKey, text: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "agent.turn.received",
            correlation_id = %correlation_id,
            conversation_key = %key,
            text_len = text.len(),
            "user message received"
        );

        match self.respond(key, text).await {
            Ok(reply) => reply,
            Err(failure) => {
                error!(
                    event_name = "agent.turn.failed",
                    correlation_id = %correlation_id,
                    conversation_key = %key,
                    error_class = failure.error_class(),
                    error = %failure,
                    "conversation turn failed"
                );
                failure.user_message().to_string()
            }
        }
    }
}
