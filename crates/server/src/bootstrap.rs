use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use concierge_agent::{
    register_erp_tools, AssistantError, ConversationService, OpenAiAssistantClient, ToolRouter,
};
use concierge_core::config::{AppConfig, ConfigError, LoadOptions};
use concierge_core::domain::thread::ConversationKey;
use concierge_db::repositories::{SqlDispatchJournal, SqlThreadRepository};
use concierge_db::{connect_with_config, migrations, DbPool};
use concierge_erp::{ErpError, OdooClient};
use concierge_line::{
    EventDispatcher, LineReplyClient, MessageResponder, ReplyError, TextMessageHandler,
    WebhookProcessor,
};
use thiserror::Error;
use tracing::info;

use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub webhook: Arc<WebhookProcessor>,
}

impl Application {
    pub fn router(&self) -> Router {
        health::router(self.db_pool.clone()).merge(webhook::router(self.webhook.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("assistant client setup failed: {0}")]
    Assistant(#[from] AssistantError),
    #[error("ERP client setup failed: {0}")]
    Erp(#[from] ErpError),
    #[error("LINE reply client setup failed: {0}")]
    Line(#[from] ReplyError),
}

/// Feeds LINE text messages into the agent; failures come back as the apology text.
pub struct AgentResponder {
    conversation: Arc<ConversationService>,
}

#[async_trait]
impl MessageResponder for AgentResponder {
    async fn respond(&self, key: &ConversationKey, text: &str) -> String {
        self.conversation.handle(key, text).await
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.database_ready",
        correlation_id = "bootstrap",
        "database connected and migrations applied"
    );

    let conversation = Arc::new(build_conversation_service(&config, &db_pool)?);

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(TextMessageHandler::new(
        AgentResponder { conversation: conversation.clone() },
        LineReplyClient::new(&config.line)?,
    ));
    let handler_count = dispatcher.handler_count();
    let webhook = Arc::new(WebhookProcessor::new(config.line.channel_secret.clone(), dispatcher));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        handler_count,
        assistant_id = %config.assistant.assistant_id,
        erp_url = %config.erp.url,
        "conversation pipeline assembled"
    );
    Ok(Application { config, db_pool, webhook })
}

fn build_conversation_service(
    config: &AppConfig,
    db_pool: &DbPool,
) -> Result<ConversationService, BootstrapError> {
    let client = Arc::new(OpenAiAssistantClient::new(&config.assistant)?);
    let erp = Arc::new(OdooClient::new(&config.erp)?);

    let mut router =
        ToolRouter::new().with_journal(Arc::new(SqlDispatchJournal::new(db_pool.clone())));
    register_erp_tools(&mut router, erp);
    info!(
        event_name = "system.bootstrap.tools_registered",
        correlation_id = "bootstrap",
        tools = ?router.names(),
        "assistant tools registered"
    );

    Ok(ConversationService::assemble(
        &config.assistant,
        client,
        Arc::new(SqlThreadRepository::new(db_pool.clone())),
        router,
    ))
}
