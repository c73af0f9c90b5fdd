use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WELCOME_MESSAGE: &str =
    "Welcome to the SK Medical chatbot! How can I assist you today?";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub assistant: AssistantConfig,
    pub erp: ErpConfig,
    pub line: LineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: SecretString,
    pub assistant_id: String,
    pub base_url: String,
    pub beta_header: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Unset means runs are polled until they terminate, however long that takes.
    pub max_wait_secs: Option<u64>,
    pub welcome_message: Option<String>,
    pub thread_preamble: Option<String>,
}

impl AssistantConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ErpConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: SecretString,
    pub search_limit: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LineConfig {
    pub channel_secret: SecretString,
    pub access_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub assistant_api_key: Option<String>,
    pub assistant_id: Option<String>,
    pub assistant_base_url: Option<String>,
    pub assistant_poll_interval_ms: Option<u64>,
    pub assistant_max_wait_secs: Option<u64>,
    pub erp_url: Option<String>,
    pub erp_database: Option<String>,
    pub erp_username: Option<String>,
    pub erp_password: Option<String>,
    pub line_channel_secret: Option<String>,
    pub line_access_token: Option<String>,
    pub line_api_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://concierge.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            assistant: AssistantConfig {
                api_key: String::new().into(),
                assistant_id: String::new(),
                base_url: "https://api.openai.com/v1".to_string(),
                beta_header: "assistants=v2".to_string(),
                timeout_secs: 60,
                poll_interval_ms: 500,
                max_wait_secs: None,
                welcome_message: Some(DEFAULT_WELCOME_MESSAGE.to_string()),
                thread_preamble: None,
            },
            erp: ErpConfig {
                url: String::new(),
                database: String::new(),
                username: String::new(),
                password: String::new().into(),
                search_limit: 10,
                timeout_secs: 30,
            },
            line: LineConfig {
                channel_secret: String::new().into(),
                access_token: String::new().into(),
                api_base_url: "https://api.line.me".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(assistant) = patch.assistant {
            if let Some(api_key_value) = assistant.api_key {
                self.assistant.api_key = secret_value(api_key_value);
            }
            if let Some(assistant_id) = assistant.assistant_id {
                self.assistant.assistant_id = assistant_id;
            }
            if let Some(base_url) = assistant.base_url {
                self.assistant.base_url = base_url;
            }
            if let Some(beta_header) = assistant.beta_header {
                self.assistant.beta_header = beta_header;
            }
            if let Some(timeout_secs) = assistant.timeout_secs {
                self.assistant.timeout_secs = timeout_secs;
            }
            if let Some(poll_interval_ms) = assistant.poll_interval_ms {
                self.assistant.poll_interval_ms = poll_interval_ms;
            }
            if let Some(max_wait_secs) = assistant.max_wait_secs {
                self.assistant.max_wait_secs = Some(max_wait_secs);
            }
            if let Some(welcome_message) = assistant.welcome_message {
                self.assistant.welcome_message = non_empty(welcome_message);
            }
            if let Some(thread_preamble) = assistant.thread_preamble {
                self.assistant.thread_preamble = non_empty(thread_preamble);
            }
        }

        if let Some(erp) = patch.erp {
            if let Some(url) = erp.url {
                self.erp.url = url;
            }
            if let Some(database) = erp.database {
                self.erp.database = database;
            }
            if let Some(username) = erp.username {
                self.erp.username = username;
            }
            if let Some(password_value) = erp.password {
                self.erp.password = secret_value(password_value);
            }
            if let Some(search_limit) = erp.search_limit {
                self.erp.search_limit = search_limit;
            }
            if let Some(timeout_secs) = erp.timeout_secs {
                self.erp.timeout_secs = timeout_secs;
            }
        }

        if let Some(line) = patch.line {
            if let Some(channel_secret_value) = line.channel_secret {
                self.line.channel_secret = secret_value(channel_secret_value);
            }
            if let Some(access_token_value) = line.access_token {
                self.line.access_token = secret_value(access_token_value);
            }
            if let Some(api_base_url) = line.api_base_url {
                self.line.api_base_url = api_base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CONCIERGE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CONCIERGE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CONCIERGE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let api_key = read_env("CONCIERGE_ASSISTANT_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.assistant.api_key = secret_value(value);
        }
        let assistant_id =
            read_env("CONCIERGE_ASSISTANT_ID").or_else(|| read_env("OPENAI_ASSISTANT_ID"));
        if let Some(value) = assistant_id {
            self.assistant.assistant_id = value;
        }
        if let Some(value) = read_env("CONCIERGE_ASSISTANT_BASE_URL") {
            self.assistant.base_url = value;
        }
        if let Some(value) = read_env("CONCIERGE_ASSISTANT_TIMEOUT_SECS") {
            self.assistant.timeout_secs = parse_u64("CONCIERGE_ASSISTANT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_ASSISTANT_POLL_INTERVAL_MS") {
            self.assistant.poll_interval_ms =
                parse_u64("CONCIERGE_ASSISTANT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_ASSISTANT_MAX_WAIT_SECS") {
            self.assistant.max_wait_secs =
                Some(parse_u64("CONCIERGE_ASSISTANT_MAX_WAIT_SECS", &value)?);
        }
        if let Some(value) = read_env("CONCIERGE_ASSISTANT_WELCOME_MESSAGE") {
            self.assistant.welcome_message = Some(value);
        }

        if let Some(value) = read_env("CONCIERGE_ERP_URL").or_else(|| read_env("ODOO_URL")) {
            self.erp.url = value;
        }
        if let Some(value) = read_env("CONCIERGE_ERP_DATABASE").or_else(|| read_env("ODOO_DB")) {
            self.erp.database = value;
        }
        let username = read_env("CONCIERGE_ERP_USERNAME").or_else(|| read_env("ODOO_USERNAME"));
        if let Some(value) = username {
            self.erp.username = value;
        }
        let password = read_env("CONCIERGE_ERP_PASSWORD").or_else(|| read_env("ODOO_PASSWORD"));
        if let Some(value) = password {
            self.erp.password = secret_value(value);
        }
        if let Some(value) = read_env("CONCIERGE_ERP_SEARCH_LIMIT") {
            self.erp.search_limit = parse_u32("CONCIERGE_ERP_SEARCH_LIMIT", &value)?;
        }

        let channel_secret =
            read_env("CONCIERGE_LINE_CHANNEL_SECRET").or_else(|| read_env("LINE_CHANNEL_SECRET"));
        if let Some(value) = channel_secret {
            self.line.channel_secret = secret_value(value);
        }
        let access_token = read_env("CONCIERGE_LINE_ACCESS_TOKEN")
            .or_else(|| read_env("LINE_CHANNEL_ACCESS_TOKEN"));
        if let Some(value) = access_token {
            self.line.access_token = secret_value(value);
        }
        if let Some(value) = read_env("CONCIERGE_LINE_API_BASE_URL") {
            self.line.api_base_url = value;
        }

        if let Some(value) = read_env("CONCIERGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_PORT") {
            self.server.port = parse_u16("CONCIERGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.assistant_api_key {
            self.assistant.api_key = secret_value(api_key);
        }
        if let Some(assistant_id) = overrides.assistant_id {
            self.assistant.assistant_id = assistant_id;
        }
        if let Some(base_url) = overrides.assistant_base_url {
            self.assistant.base_url = base_url;
        }
        if let Some(poll_interval_ms) = overrides.assistant_poll_interval_ms {
            self.assistant.poll_interval_ms = poll_interval_ms;
        }
        if let Some(max_wait_secs) = overrides.assistant_max_wait_secs {
            self.assistant.max_wait_secs = Some(max_wait_secs);
        }
        if let Some(url) = overrides.erp_url {
            self.erp.url = url;
        }
        if let Some(database) = overrides.erp_database {
            self.erp.database = database;
        }
        if let Some(username) = overrides.erp_username {
            self.erp.username = username;
        }
        if let Some(password) = overrides.erp_password {
            self.erp.password = secret_value(password);
        }
        if let Some(channel_secret) = overrides.line_channel_secret {
            self.line.channel_secret = secret_value(channel_secret);
        }
        if let Some(access_token) = overrides.line_access_token {
            self.line.access_token = secret_value(access_token);
        }
        if let Some(api_base_url) = overrides.line_api_base_url {
            self.line.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_assistant(&self.assistant)?;
        validate_erp(&self.erp)?;
        validate_line(&self.line)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    if assistant.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "assistant.api_key is required (set CONCIERGE_ASSISTANT_API_KEY or OPENAI_API_KEY)"
                .to_string(),
        ));
    }

    let assistant_id = assistant.assistant_id.trim();
    if assistant_id.is_empty() {
        return Err(ConfigError::Validation(
            "assistant.assistant_id is required (set CONCIERGE_ASSISTANT_ID or OPENAI_ASSISTANT_ID)"
                .to_string(),
        ));
    }
    if !assistant_id.starts_with("asst_") {
        return Err(ConfigError::Validation(
            "assistant.assistant_id must start with `asst_`".to_string(),
        ));
    }

    validate_http_url("assistant.base_url", &assistant.base_url)?;

    if assistant.timeout_secs == 0 || assistant.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "assistant.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if assistant.poll_interval_ms == 0 || assistant.poll_interval_ms > 60_000 {
        return Err(ConfigError::Validation(
            "assistant.poll_interval_ms must be in range 1..=60000".to_string(),
        ));
    }

    if assistant.max_wait_secs == Some(0) {
        return Err(ConfigError::Validation(
            "assistant.max_wait_secs must be greater than zero when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_erp(erp: &ErpConfig) -> Result<(), ConfigError> {
    validate_http_url("erp.url", &erp.url)?;

    if erp.database.trim().is_empty() {
        return Err(ConfigError::Validation(
            "erp.database is required (set CONCIERGE_ERP_DATABASE or ODOO_DB)".to_string(),
        ));
    }
    if erp.username.trim().is_empty() {
        return Err(ConfigError::Validation(
            "erp.username is required (set CONCIERGE_ERP_USERNAME or ODOO_USERNAME)".to_string(),
        ));
    }
    if erp.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "erp.password is required (set CONCIERGE_ERP_PASSWORD or ODOO_PASSWORD)".to_string(),
        ));
    }
    if erp.search_limit == 0 || erp.search_limit > 100 {
        return Err(ConfigError::Validation(
            "erp.search_limit must be in range 1..=100".to_string(),
        ));
    }
    if erp.timeout_secs == 0 || erp.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "erp.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_line(line: &LineConfig) -> Result<(), ConfigError> {
    if line.channel_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.channel_secret is required. Get it from https://developers.line.biz/console > Your Channel > Basic settings".to_string(),
        ));
    }
    if line.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.access_token is required. Get it from https://developers.line.biz/console > Your Channel > Messaging API".to_string(),
        ));
    }

    validate_http_url("line.api_base_url", &line.api_base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} is required")));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    assistant: Option<AssistantPatch>,
    erp: Option<ErpPatch>,
    line: Option<LinePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    api_key: Option<String>,
    assistant_id: Option<String>,
    base_url: Option<String>,
    beta_header: Option<String>,
    timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_wait_secs: Option<u64>,
    welcome_message: Option<String>,
    thread_preamble: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErpPatch {
    url: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    search_limit: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LinePatch {
    channel_secret: Option<String>,
    access_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
