use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use concierge_core::domain::tool::{
    DispatchOutcome, ToolArguments, ToolCall, ToolDispatchRecord, ToolOutput,
};
use concierge_db::repositories::DispatchJournal;
use concierge_erp::ErpError;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

pub const TOOL_ERROR_PREFIX: &str = "Error, please make sure you made the correct tool call:";

#[derive(Debug, Error)]
pub enum ToolDispatchError {
    #[error("malformed arguments: {0}")]
    MalformedArguments(String),
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("argument `{name}` must be {expected}")]
    InvalidArgument { name: String, expected: &'static str },
    #[error(transparent)]
    Backend(#[from] ErpError),
}

/// Typed tool result; rendered to text only when handed back to the assistant.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolReply {
    Text(String),
    Json { summary: Option<String>, body: Value },
}

impl ToolReply {
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json { summary, body } => {
                let pretty =
                    serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
                match summary {
                    Some(summary) => format!("{summary}\n{pretty}"),
                    None => pretty,
                }
            }
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolReply, ToolDispatchError>;
}

/// Fixed name → tool mapping. Dispatch always yields text: unknown names and
/// tool failures are reported to the assistant instead of aborting the run.
#[derive(Default)]
pub struct ToolRouter {
    tools: HashMap<String, Box<dyn Tool>>,
    journal: Option<Arc<dyn DispatchJournal>>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Arc<dyn DispatchJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn dispatch(&self, name: &str, arguments: &ToolArguments) -> String {
        let (outcome, output) = self.run_tool(name, Ok(arguments)).await;
        self.record(None, name, arguments.to_json(), outcome, &output).await;
        output
    }

    /// Dispatches one call from a `requires_action` batch; malformed argument
    /// JSON becomes error text like any other tool failure.
    pub async fn dispatch_call(&self, call: &ToolCall) -> ToolOutput {
        let parsed = ToolArguments::parse(&call.arguments)
            .map_err(|error| ToolDispatchError::MalformedArguments(error.to_string()));
        let (outcome, output) = self.run_tool(&call.name, parsed.as_ref()).await;
        self.record(Some(&call.id), &call.name, call.arguments.clone(), outcome, &output).await;
        ToolOutput { tool_call_id: call.id.clone(), output }
    }

    async fn run_tool(
        &self,
        name: &str,
        arguments: Result<&ToolArguments, &ToolDispatchError>,
    ) -> (DispatchOutcome, String) {
        let Some(tool) = self.tools.get(name) else {
            return (DispatchOutcome::UnknownTool, format!("Unknown tool: {name}"));
        };

        let result = match arguments {
            Ok(arguments) => tool.execute(arguments).await,
            Err(error) => return (DispatchOutcome::Error, format!("{TOOL_ERROR_PREFIX} {error}")),
        };

        match result {
            Ok(reply) => (DispatchOutcome::Ok, reply.render()),
            Err(error) => (DispatchOutcome::Error, format!("{TOOL_ERROR_PREFIX} {error}")),
        }
    }

    async fn record(
        &self,
        tool_call_id: Option<&str>,
        name: &str,
        arguments_json: String,
        outcome: DispatchOutcome,
        output: &str,
    ) {
        info!(
            event_name = "agent.tool.dispatched",
            tool_call_id = tool_call_id.unwrap_or_default(),
            tool_name = name,
            outcome = outcome.as_str(),
            output_len = output.len(),
            "tool call dispatched"
        );

        let Some(journal) = &self.journal else {
            return;
        };
        let record = ToolDispatchRecord {
            tool_call_id: tool_call_id.map(str::to_string),
            tool_name: name.to_string(),
            arguments_json,
            outcome,
            output: output.to_string(),
            recorded_at: Utc::now(),
        };
        if let Err(error) = journal.record(record).await {
            warn!(
                event_name = "agent.tool.journal_failed",
                tool_name = name,
                error = %error,
                "failed to journal tool dispatch"
            );
        }
    }
}
