use thiserror::Error;

use crate::domain::run::{RunError, RunId};

/// The only text an end user ever sees when a conversation turn fails.
pub const GENERIC_APOLOGY: &str = "Sorry, something went wrong.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("thread store unavailable: {0}")]
    Unavailable(String),
    #[error("thread store returned corrupt data: {0}")]
    Corrupt(String),
}

/// Failure of a single call to the assistant service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssistantError {
    #[error("thread already has an active run {run_id}")]
    ActiveRun { run_id: RunId },
    #[error("assistant API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("assistant API transport error: {0}")]
    Transport(String),
    #[error("unexpected assistant API response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("run creation rejected: {0}")]
    RunCreation(#[source] AssistantError),
    #[error("run {run_id} failed: {}", describe_run_error(.error))]
    RunFailed { run_id: RunId, error: RunError },
    #[error("run {run_id} was cancelled")]
    RunCancelled { run_id: RunId },
    #[error("run {run_id} did not reach a terminal state within {waited_secs}s")]
    RunTimedOut { run_id: RunId, waited_secs: u64 },
    #[error("assistant service failure: {0}")]
    Assistant(#[from] AssistantError),
}

impl ConversationError {
    pub fn user_message(&self) -> &'static str {
        GENERIC_APOLOGY
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::RunCreation(_) => "run_creation",
            Self::RunFailed { .. } => "run_failed",
            Self::RunCancelled { .. } => "run_cancelled",
            Self::RunTimedOut { .. } => "run_timed_out",
            Self::Assistant(_) => "assistant",
        }
    }
}

fn describe_run_error(error: &RunError) -> String {
    format!(
        "{} (type={}, code={})",
        error.message,
        error.kind.as_deref().unwrap_or("unknown"),
        error.code.as_deref().unwrap_or("unknown")
    )
}
