use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::thread::ThreadId;
use crate::domain::tool::ToolCall;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Server-side run status. Transitions happen upstream; this side only observes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(value) => value.as_str(),
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "requires_action" => Self::RequiresAction,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Terminal, or waiting on this side to submit tool outputs.
    pub fn is_actionable(&self) -> bool {
        self.is_terminal() || matches!(self, Self::RequiresAction)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    pub kind: Option<String>,
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequiredAction {
    SubmitToolOutputs { tool_calls: Vec<ToolCall> },
    Other { kind: String },
}

/// Snapshot of a run as last observed from the assistant service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    pub thread_id: ThreadId,
    pub status: RunStatus,
    pub required_action: Option<RequiredAction>,
    pub last_error: Option<RunError>,
}

impl Run {
    /// A bare handle for a run known only by id, e.g. one named in a conflict rejection.
    pub fn handle(thread_id: ThreadId, run_id: RunId) -> Self {
        Self {
            id: run_id,
            thread_id,
            status: RunStatus::Other("unknown".to_owned()),
            required_action: None,
            last_error: None,
        }
    }

    pub fn pending_tool_calls(&self) -> Option<&[ToolCall]> {
        match &self.required_action {
            Some(RequiredAction::SubmitToolOutputs { tool_calls }) => Some(tool_calls),
            _ => None,
        }
    }
}
