use std::slice;
use std::sync::Arc;

use concierge_core::domain::message::NewMessage;
use concierge_core::domain::run::{RequiredAction, Run, RunId, RunStatus};
use concierge_core::domain::thread::ThreadId;
use concierge_core::domain::tool::{ToolCall, ToolOutput};
use concierge_core::errors::ConversationError;
use tracing::{info, warn};

use crate::assistant::{AssistantClient, AssistantError};
use crate::monitor::RunMonitor;
use crate::tools::ToolRouter;

/// Drives one run from creation to a terminal state.
///
/// At most one active run per thread: a creation conflict first drives the
/// conflicting run to completion, then retries creation exactly once.
pub struct RunController {
    client: Arc<dyn AssistantClient>,
    monitor: Arc<dyn RunMonitor>,
    router: Arc<ToolRouter>,
}

impl RunController {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        monitor: Arc<dyn RunMonitor>,
        router: Arc<ToolRouter>,
    ) -> Self {
        Self { client, monitor, router }
    }

    pub async fn start_run(
        &self,
        thread_id: &ThreadId,
        message: &NewMessage,
    ) -> Result<Run, ConversationError> {
        let messages = slice::from_ref(message);
        let run = match self.client.create_run(thread_id, messages).await {
            Ok(run) => run,
            Err(AssistantError::ActiveRun { run_id }) => {
                self.resolve_conflict(thread_id, run_id).await?;
                self.client
                    .create_run(thread_id, messages)
                    .await
                    .map_err(ConversationError::RunCreation)?
            }
            Err(error) => return Err(ConversationError::RunCreation(error)),
        };

        info!(
            event_name = "agent.run.created",
            thread_id = %thread_id,
            run_id = %run.id,
            "run created"
        );
        self.drive_to_completion(run).await
    }

    /// Polls until terminal, submitting one output per pending tool call whenever
    /// the run requires action. Only `completed` returns `Ok`.
    pub async fn drive_to_completion(&self, run: Run) -> Result<Run, ConversationError> {
        let Run { id: run_id, thread_id, .. } = run;

        loop {
            let snapshot = self.monitor.await_actionable(&thread_id, &run_id).await?;
            match snapshot.status {
                RunStatus::Completed => {
                    info!(
                        event_name = "agent.run.completed",
                        thread_id = %thread_id,
                        run_id = %run_id,
                        "run completed"
                    );
                    return Ok(snapshot);
                }
                RunStatus::Failed => {
                    return Err(ConversationError::RunFailed {
                        run_id,
                        error: snapshot.last_error.unwrap_or_default(),
                    });
                }
                RunStatus::Cancelled => return Err(ConversationError::RunCancelled { run_id }),
                RunStatus::RequiresAction => match &snapshot.required_action {
                    Some(RequiredAction::SubmitToolOutputs { tool_calls }) => {
                        let outputs = self.dispatch_batch(tool_calls).await;
                        self.client
                            .submit_tool_outputs(&thread_id, &run_id, &outputs)
                            .await?;
                    }
                    Some(RequiredAction::Other { kind }) => {
                        return Err(AssistantError::Decode(format!(
                            "run {run_id} requires unsupported action `{kind}`"
                        ))
                        .into());
                    }
                    None => {
                        return Err(AssistantError::Decode(format!(
                            "run {run_id} requires action but carries no payload"
                        ))
                        .into());
                    }
                },
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Other(_) => continue,
            }
        }
    }

    async fn resolve_conflict(
        &self,
        thread_id: &ThreadId,
        run_id: RunId,
    ) -> Result<(), ConversationError> {
        info!(
            event_name = "agent.run.conflict",
            thread_id = %thread_id,
            run_id = %run_id,
            "thread has an active run; driving it to completion before retrying"
        );

        match self.drive_to_completion(Run::handle(thread_id.clone(), run_id)).await {
            Ok(_) => Ok(()),
            Err(
                error @ (ConversationError::RunFailed { .. } | ConversationError::RunCancelled { .. }),
            ) => {
                warn!(
                    event_name = "agent.run.conflict_ended_badly",
                    thread_id = %thread_id,
                    error = %error,
                    "conflicting run ended without completing; retrying creation anyway"
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn dispatch_batch(&self, tool_calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            outputs.push(self.router.dispatch_call(call).await);
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use concierge_core::domain::message::NewMessage;
    use concierge_core::domain::run::{RequiredAction, RunError, RunId, RunStatus};
    use concierge_core::domain::thread::ThreadId;
    use concierge_core::errors::{ConversationError, GENERIC_APOLOGY};
    use tokio::sync::Mutex;

    use super::RunController;
    use crate::assistant::AssistantError;
    use crate::monitor::PollingMonitor;
    use crate::testing::{failed, requires_tools, run, EventLog, RecordingTool, ScriptedAssistant};
    use crate::tools::{ToolRouter, TOOL_ERROR_PREFIX};

    fn controller(events: &EventLog) -> (RunController, Arc<ScriptedAssistant>) {
        let client = Arc::new(ScriptedAssistant::new(events.clone()));
        let monitor =
            Arc::new(PollingMonitor::new(client.clone(), Duration::from_millis(1), None));
        let mut router = ToolRouter::new();
        router.register(RecordingTool { name: "lookup", fail: false, events: events.clone() });
        router.register(RecordingTool { name: "broken", fail: true, events: events.clone() });
        (RunController::new(client.clone(), monitor, Arc::new(router)), client)
    }

    fn thread() -> ThreadId {
        ThreadId::from("thread_1")
    }

    fn conflict(run_id: &str) -> AssistantError {
        AssistantError::ActiveRun { run_id: RunId::from(run_id) }
    }

    #[tokio::test]
    async fn submits_one_output_per_call_after_whole_batch_is_dispatched() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client.script_create_runs(vec![Ok(run("run_1", RunStatus::Queued))]).await;
        client
            .script_polls(vec![
                run("run_1", RunStatus::InProgress),
                requires_tools(
                    "run_1",
                    &[
                        ("call_a", "lookup", r#"{"sku":"A"}"#),
                        ("call_b", "broken", "{}"),
                        ("call_c", "missing_tool", "{}"),
                    ],
                ),
                run("run_1", RunStatus::InProgress),
                run("run_1", RunStatus::Completed),
            ])
            .await;

        let finished = controller
            .start_run(&thread(), &NewMessage::user("hello"))
            .await
            .expect("run should complete");

        assert_eq!(finished.status, RunStatus::Completed);
        assert_eq!(
            *events.lock().await,
            vec!["create_run", "dispatch:lookup", "dispatch:broken", "submit:3"]
        );

        let state = client.state.lock().await;
        assert_eq!(state.submitted.len(), 1);
        let outputs = &state.submitted[0].1;
        let ids: Vec<&str> = outputs.iter().map(|output| output.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["call_a", "call_b", "call_c"]);
        assert!(outputs[1].output.starts_with(TOOL_ERROR_PREFIX));
        assert_eq!(outputs[2].output, "Unknown tool: missing_tool");
        assert_eq!(state.run_requests[0].1, vec![NewMessage::user("hello")]);
    }

    #[tokio::test]
    async fn repeated_action_rounds_are_each_submitted() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client.script_create_runs(vec![Ok(run("run_1", RunStatus::Queued))]).await;
        client
            .script_polls(vec![
                requires_tools("run_1", &[("call_a", "lookup", "{}")]),
                requires_tools("run_1", &[("call_b", "lookup", "{}")]),
                run("run_1", RunStatus::Completed),
            ])
            .await;

        controller.start_run(&thread(), &NewMessage::user("hi")).await.expect("completes");

        assert_eq!(client.state.lock().await.submitted.len(), 2);
    }

    #[tokio::test]
    async fn conflict_drives_active_run_then_retries_once() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client
            .script_create_runs(vec![Err(conflict("run_old")), Ok(run("run_new", RunStatus::Queued))])
            .await;
        client
            .script_polls(vec![
                run("run_old", RunStatus::InProgress),
                run("run_old", RunStatus::Completed),
                run("run_new", RunStatus::Completed),
            ])
            .await;

        let finished =
            controller.start_run(&thread(), &NewMessage::user("hi")).await.expect("completes");

        assert_eq!(finished.id, RunId::from("run_new"));
        let state = client.state.lock().await;
        assert_eq!(state.run_requests.len(), 2);
        assert_eq!(
            state.polled,
            vec![RunId::from("run_old"), RunId::from("run_old"), RunId::from("run_new")]
        );
    }

    #[tokio::test]
    async fn second_conflict_is_a_run_creation_error() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client.script_create_runs(vec![Err(conflict("run_old")), Err(conflict("run_other"))]).await;
        client.script_polls(vec![run("run_old", RunStatus::Completed)]).await;

        let error = controller
            .start_run(&thread(), &NewMessage::user("hi"))
            .await
            .expect_err("second conflict is fatal");

        assert_eq!(error, ConversationError::RunCreation(conflict("run_other")));
        assert_eq!(client.state.lock().await.run_requests.len(), 2);
    }

    #[tokio::test]
    async fn failed_conflicting_run_still_allows_the_retry() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client
            .script_create_runs(vec![Err(conflict("run_old")), Ok(run("run_new", RunStatus::Queued))])
            .await;
        client
            .script_polls(vec![
                run("run_old", RunStatus::Cancelled),
                run("run_new", RunStatus::Completed),
            ])
            .await;

        let finished =
            controller.start_run(&thread(), &NewMessage::user("hi")).await.expect("completes");

        assert_eq!(finished.id, RunId::from("run_new"));
    }

    #[tokio::test]
    async fn other_rejections_are_run_creation_errors_without_retry() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client
            .script_create_runs(vec![Err(AssistantError::Api {
                status: 404,
                message: "No thread found with id 'thread_1'.".into(),
            })])
            .await;

        let error = controller
            .start_run(&thread(), &NewMessage::user("hi"))
            .await
            .expect_err("rejection is fatal");

        assert_eq!(
            error,
            ConversationError::RunCreation(AssistantError::Api {
                status: 404,
                message: "No thread found with id 'thread_1'.".into(),
            })
        );
        assert_eq!(error.error_class(), "run_creation");
        assert_eq!(client.state.lock().await.run_requests.len(), 1);
    }

    #[tokio::test]
    async fn failed_run_carries_upstream_detail_but_user_sees_apology() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client.script_create_runs(vec![Ok(run("run_1", RunStatus::Queued))]).await;
        client.script_polls(vec![failed("run_1", "X", "Y", "Z")]).await;

        let error = controller
            .start_run(&thread(), &NewMessage::user("hi"))
            .await
            .expect_err("failed run is fatal");

        assert_eq!(
            error,
            ConversationError::RunFailed {
                run_id: RunId::from("run_1"),
                error: RunError {
                    message: "X".into(),
                    kind: Some("Y".into()),
                    code: Some("Z".into()),
                },
            }
        );
        assert_eq!(error.user_message(), GENERIC_APOLOGY);
    }

    #[tokio::test]
    async fn cancelled_run_is_reported() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        client.script_create_runs(vec![Ok(run("run_1", RunStatus::Queued))]).await;
        client.script_polls(vec![run("run_1", RunStatus::Cancelled)]).await;

        let error = controller
            .start_run(&thread(), &NewMessage::user("hi"))
            .await
            .expect_err("cancelled run is fatal");

        assert_eq!(error, ConversationError::RunCancelled { run_id: RunId::from("run_1") });
    }

    #[tokio::test]
    async fn unsupported_required_action_is_an_assistant_error() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let (controller, client) = controller(&events);
        let mut pending = run("run_1", RunStatus::RequiresAction);
        pending.required_action = Some(RequiredAction::Other { kind: "submit_approval".into() });
        client.script_create_runs(vec![Ok(run("run_1", RunStatus::Queued))]).await;
        client.script_polls(vec![pending]).await;

        let error = controller
            .start_run(&thread(), &NewMessage::user("hi"))
            .await
            .expect_err("unsupported action is fatal");

        assert_eq!(
            error,
            ConversationError::Assistant(AssistantError::Decode(
                "run run_1 requires unsupported action `submit_approval`".into()
            ))
        );
        assert!(client.state.lock().await.submitted.is_empty());
    }
}
