//! Scripted collaborators shared by the crate's unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::domain::message::{ContentPart, Message, MessageRole, NewMessage};
use concierge_core::domain::run::{RequiredAction, Run, RunError, RunId, RunStatus};
use concierge_core::domain::thread::ThreadId;
use concierge_core::domain::tool::{ToolArguments, ToolCall, ToolOutput};
use tokio::sync::Mutex;

use crate::assistant::{AssistantClient, AssistantError};
use crate::tools::{Tool, ToolDispatchError, ToolReply};

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn run(id: &str, status: RunStatus) -> Run {
    Run {
        id: RunId::from(id),
        thread_id: ThreadId::from("thread_1"),
        status,
        required_action: None,
        last_error: None,
    }
}

pub fn requires_tools(id: &str, calls: &[(&str, &str, &str)]) -> Run {
    let mut snapshot = run(id, RunStatus::RequiresAction);
    snapshot.required_action = Some(RequiredAction::SubmitToolOutputs {
        tool_calls: calls
            .iter()
            .map(|(call_id, name, arguments)| ToolCall {
                id: (*call_id).to_string(),
                name: (*name).to_string(),
                arguments: (*arguments).to_string(),
            })
            .collect(),
    });
    snapshot
}

pub fn failed(id: &str, message: &str, kind: &str, code: &str) -> Run {
    let mut snapshot = run(id, RunStatus::Failed);
    snapshot.last_error = Some(RunError {
        message: message.to_string(),
        kind: Some(kind.to_string()),
        code: Some(code.to_string()),
    });
    snapshot
}

pub fn text_message(id: &str, role: MessageRole, created_at: i64, text: &str) -> Message {
    Message {
        id: id.to_string(),
        role,
        created_at,
        content: vec![ContentPart::Text(text.to_string())],
    }
}

#[derive(Default)]
pub struct AssistantState {
    pub create_run_results: VecDeque<Result<Run, AssistantError>>,
    pub get_run_results: VecDeque<Result<Run, AssistantError>>,
    pub messages: Vec<Message>,
    pub created_threads: Vec<Vec<NewMessage>>,
    pub added_messages: Vec<(ThreadId, NewMessage)>,
    pub run_requests: Vec<(ThreadId, Vec<NewMessage>)>,
    pub polled: Vec<RunId>,
    pub submitted: Vec<(RunId, Vec<ToolOutput>)>,
    pub fail_create_thread: bool,
}

pub struct ScriptedAssistant {
    pub state: Mutex<AssistantState>,
    pub events: EventLog,
}

impl ScriptedAssistant {
    pub fn new(events: EventLog) -> Self {
        Self { state: Mutex::new(AssistantState::default()), events }
    }

    pub async fn script_create_runs(&self, results: Vec<Result<Run, AssistantError>>) {
        self.state.lock().await.create_run_results.extend(results);
    }

    pub async fn script_polls(&self, results: Vec<Run>) {
        self.state.lock().await.get_run_results.extend(results.into_iter().map(Ok));
    }

    pub async fn set_messages(&self, messages: Vec<Message>) {
        self.state.lock().await.messages = messages;
    }
}

#[async_trait]
impl AssistantClient for ScriptedAssistant {
    async fn create_thread(
        &self,
        initial_messages: &[NewMessage],
    ) -> Result<ThreadId, AssistantError> {
        let mut state = self.state.lock().await;
        if state.fail_create_thread {
            return Err(AssistantError::Transport("connection refused".into()));
        }
        state.created_threads.push(initial_messages.to_vec());
        Ok(ThreadId(format!("thread_{}", state.created_threads.len())))
    }

    async fn add_message(
        &self,
        thread_id: &ThreadId,
        message: &NewMessage,
    ) -> Result<(), AssistantError> {
        self.state.lock().await.added_messages.push((thread_id.clone(), message.clone()));
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &ThreadId,
        messages: &[NewMessage],
    ) -> Result<Run, AssistantError> {
        self.events.lock().await.push("create_run".into());
        let mut state = self.state.lock().await;
        state.run_requests.push((thread_id.clone(), messages.to_vec()));
        state
            .create_run_results
            .pop_front()
            .unwrap_or_else(|| Err(AssistantError::Decode("create_run script exhausted".into())))
    }

    async fn get_run(&self, _thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError> {
        let mut state = self.state.lock().await;
        state.polled.push(run_id.clone());
        state
            .get_run_results
            .pop_front()
            .unwrap_or_else(|| Err(AssistantError::Decode("get_run script exhausted".into())))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        self.events.lock().await.push(format!("submit:{}", outputs.len()));
        self.state.lock().await.submitted.push((run_id.clone(), outputs.to_vec()));
        Ok(run(&run_id.0, RunStatus::Queued))
    }

    async fn list_messages(&self, _thread_id: &ThreadId) -> Result<Vec<Message>, AssistantError> {
        Ok(self.state.lock().await.messages.clone())
    }
}

/// Echoes its arguments back, or fails when `fail` is set. Logs `dispatch:<name>`.
pub struct RecordingTool {
    pub name: &'static str,
    pub fail: bool,
    pub events: EventLog,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolReply, ToolDispatchError> {
        self.events.lock().await.push(format!("dispatch:{}", self.name));
        if self.fail {
            return Err(ToolDispatchError::InvalidArgument {
                name: "sku".to_string(),
                expected: "an existing product reference",
            });
        }
        Ok(ToolReply::Text(format!("{} saw {}", self.name, arguments.to_json())))
    }
}
