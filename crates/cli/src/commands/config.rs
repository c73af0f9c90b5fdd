use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use concierge_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One rendered config entry: dotted key, display value, env vars checked in order.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file = ConfigFile::detect();
    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields(&config).iter().map(|field| {
        format!("- {} = {} (source: {})", field.key, field.value, file.source_of(field))
    }));
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let assistant = &config.assistant;
    let erp = &config.erp;
    let line = &config.line;

    vec![
        Field::new("database.url", &config.database.url, &["CONCIERGE_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CONCIERGE_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CONCIERGE_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "assistant.api_key",
            redact(&assistant.api_key),
            &["CONCIERGE_ASSISTANT_API_KEY", "OPENAI_API_KEY"],
        ),
        Field::new(
            "assistant.assistant_id",
            &assistant.assistant_id,
            &["CONCIERGE_ASSISTANT_ID", "OPENAI_ASSISTANT_ID"],
        ),
        Field::new("assistant.base_url", &assistant.base_url, &["CONCIERGE_ASSISTANT_BASE_URL"]),
        Field::new("assistant.beta_header", &assistant.beta_header, &[]),
        Field::new(
            "assistant.poll_interval_ms",
            assistant.poll_interval_ms.to_string(),
            &["CONCIERGE_ASSISTANT_POLL_INTERVAL_MS"],
        ),
        Field::new(
            "assistant.max_wait_secs",
            assistant
                .max_wait_secs
                .map(|secs| secs.to_string())
                .unwrap_or_else(|| "<unbounded>".to_string()),
            &["CONCIERGE_ASSISTANT_MAX_WAIT_SECS"],
        ),
        Field::new(
            "assistant.welcome_message",
            assistant.welcome_message.as_deref().unwrap_or("<unset>"),
            &["CONCIERGE_ASSISTANT_WELCOME_MESSAGE"],
        ),
        Field::new("erp.url", &erp.url, &["CONCIERGE_ERP_URL", "ODOO_URL"]),
        Field::new("erp.database", &erp.database, &["CONCIERGE_ERP_DATABASE", "ODOO_DB"]),
        Field::new("erp.username", &erp.username, &["CONCIERGE_ERP_USERNAME", "ODOO_USERNAME"]),
        Field::new(
            "erp.password",
            redact(&erp.password),
            &["CONCIERGE_ERP_PASSWORD", "ODOO_PASSWORD"],
        ),
        Field::new(
            "erp.search_limit",
            erp.search_limit.to_string(),
            &["CONCIERGE_ERP_SEARCH_LIMIT"],
        ),
        Field::new(
            "line.channel_secret",
            redact(&line.channel_secret),
            &["CONCIERGE_LINE_CHANNEL_SECRET", "LINE_CHANNEL_SECRET"],
        ),
        Field::new(
            "line.access_token",
            redact(&line.access_token),
            &["CONCIERGE_LINE_ACCESS_TOKEN", "LINE_CHANNEL_ACCESS_TOKEN"],
        ),
        Field::new("line.api_base_url", &line.api_base_url, &["CONCIERGE_LINE_API_BASE_URL"]),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["CONCIERGE_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["CONCIERGE_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
        ),
    ]
}

struct ConfigFile {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl ConfigFile {
    fn detect() -> Self {
        let path = [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
            .into_iter()
            .find(|path| path.exists());
        let doc = path.as_deref().and_then(load_doc);
        Self { path, doc }
    }

    fn source_of(&self, field: &Field) -> String {
        if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if self.doc.as_ref().is_some_and(|doc| contains_path(doc, field.key)) {
            let file_path = self
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }

        "default".to_string()
    }
}

fn load_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
