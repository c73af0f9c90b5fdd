//! Agent runtime - run orchestration between the chat channel and the assistant service
//!
//! The crate owns the conversation turn:
//! - resolves (or creates) the assistant thread for a conversation key (`threads`)
//! - creates a run carrying the user message, resolving "active run" conflicts (`runtime`)
//! - waits for the run to become actionable (`monitor`)
//! - dispatches requested tool calls to ERP-backed tools (`tools`, `erp_tools`)
//! - extracts the latest assistant reply from the thread (`reply`)
//!
//! # Key Types
//!
//! - `ConversationService` - one inbound message in, one reply string out
//! - `AssistantClient` - thread/run/message operations against the assistant API
//! - `RunController` - the run state machine
//! - `ToolRouter` - name → tool mapping that never fails a run
//!
//! # Failure Principle
//!
//! End users only ever see the reply text or a fixed apology. Upstream error
//! detail is logged, never forwarded.

pub mod assistant;
pub mod conversation;
pub mod erp_tools;
pub mod monitor;
pub mod reply;
pub mod runtime;
pub mod threads;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use assistant::{AssistantClient, AssistantError, OpenAiAssistantClient};
pub use conversation::ConversationService;
pub use erp_tools::register_erp_tools;
pub use monitor::{PollingMonitor, RunMonitor};
pub use reply::latest_reply;
pub use runtime::RunController;
pub use threads::ThreadResolver;
pub use tools::{Tool, ToolDispatchError, ToolReply, ToolRouter};
