use std::sync::Arc;

use concierge_agent::{register_erp_tools, ConversationService, OpenAiAssistantClient, ToolRouter};
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_core::domain::thread::ConversationKey;
use concierge_db::migrations;
use concierge_db::repositories::{SqlDispatchJournal, SqlThreadRepository};
use concierge_erp::OdooClient;

use crate::commands::{block_on, open_pool, CommandResult};

/// Sends one message through the same pipeline the webhook uses and prints
/// the reply. Unlike the webhook, failures surface their error class.
pub fn run(key: &str, text: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    if key.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_input", "--key must not be empty", 2);
    }

    let result = block_on("ask", async {
        let pool = open_pool(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let service = build_service(&config, &pool)?;
        let reply = service
            .respond(&ConversationKey::from(key), text)
            .await
            .map_err(|error| (error.error_class(), error.to_string(), 6u8));
        pool.close().await;
        reply
    });

    match result {
        Ok(Ok(reply)) => CommandResult::success("ask", reply),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
        Err(runtime_failure) => runtime_failure,
    }
}

fn build_service(
    config: &AppConfig,
    pool: &concierge_db::DbPool,
) -> Result<ConversationService, (&'static str, String, u8)> {
    let client = OpenAiAssistantClient::new(&config.assistant)
        .map_err(|error| ("assistant_client", error.to_string(), 3u8))?;
    let erp = OdooClient::new(&config.erp).map_err(|error| ("erp_client", error.to_string(), 3u8))?;

    let mut router =
        ToolRouter::new().with_journal(Arc::new(SqlDispatchJournal::new(pool.clone())));
    register_erp_tools(&mut router, Arc::new(erp));

    Ok(ConversationService::assemble(
        &config.assistant,
        Arc::new(client),
        Arc::new(SqlThreadRepository::new(pool.clone())),
        router,
    ))
}
