pub mod config;
pub mod domain;
pub mod errors;

pub use domain::message::{ContentPart, Message, MessageRole, NewMessage};
pub use domain::run::{RequiredAction, Run, RunError, RunId, RunStatus};
pub use domain::thread::{ConversationKey, ThreadId};
pub use domain::tool::{
    DispatchOutcome, ToolArguments, ToolCall, ToolDispatchRecord, ToolOutput, ToolValue,
};
pub use errors::{AssistantError, ConversationError, StorageError, GENERIC_APOLOGY};
