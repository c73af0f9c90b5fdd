use crate::commands::{block_on, open_pool, CommandResult};
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_db::migrations;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let result = block_on("migrate", async {
        let pool = open_pool(&config).await?;
        let applied = migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8));
        pool.close().await;
        applied
    });

    match result {
        Ok(Ok(())) => CommandResult::success(
            "migrate",
            format!("schema is at version {}", migrations::latest_version()),
        ),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
        Err(runtime_failure) => runtime_failure,
    }
}
