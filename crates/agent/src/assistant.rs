use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::AssistantConfig;
use concierge_core::domain::message::{ContentPart, Message, MessageRole, NewMessage};
use concierge_core::domain::run::{RequiredAction, Run, RunError, RunId, RunStatus};
use concierge_core::domain::thread::ThreadId;
use concierge_core::domain::tool::{ToolCall, ToolOutput};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const ACTIVE_RUN_MARKER: &str = "already has an active run";
const MESSAGE_PAGE_SIZE: u32 = 20;

pub use concierge_core::errors::AssistantError;

/// Thread, run and message operations against an Assistants-style service.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_thread(&self, initial_messages: &[NewMessage])
        -> Result<ThreadId, AssistantError>;
    async fn add_message(
        &self,
        thread_id: &ThreadId,
        message: &NewMessage,
    ) -> Result<(), AssistantError>;
    /// Fails with `AssistantError::ActiveRun` when the thread already has a non-terminal run.
    async fn create_run(
        &self,
        thread_id: &ThreadId,
        messages: &[NewMessage],
    ) -> Result<Run, AssistantError>;
    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError>;
    async fn submit_tool_outputs(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError>;
    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>, AssistantError>;
}

pub struct OpenAiAssistantClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    assistant_id: String,
    beta_header: String,
}

impl OpenAiAssistantClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| AssistantError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            assistant_id: config.assistant_id.clone(),
            beta_header: config.beta_header.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("OpenAI-Beta", &self.beta_header)
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, AssistantError>
    where
        T: DeserializeOwned,
    {
        let response =
            request.send().await.map_err(|error| AssistantError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| AssistantError::Transport(format!("reading response body: {error}")))?;
        debug!(
            event_name = "assistant.http.response",
            status = status.as_u16(),
            "assistant API responded"
        );

        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let error_object =
            parsed.as_ref().and_then(|value| value.get("error")).filter(|error| !error.is_null());

        if !status.is_success() || error_object.is_some() {
            return Err(classify_rejection(status.as_u16(), error_object, &body));
        }

        let value =
            parsed.ok_or_else(|| AssistantError::Decode(format!("non-JSON body: {body}")))?;
        serde_json::from_value(value).map_err(|error| AssistantError::Decode(error.to_string()))
    }
}

/// Structured `active_run_id` wins; the free-text "already has an active run"
/// message is the fallback and must name a `run_…` id to count as a conflict.
fn classify_rejection(status: u16, error: Option<&Value>, body: &str) -> AssistantError {
    let message = error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    let structured_run_id = error
        .and_then(|error| error.get("active_run_id"))
        .and_then(Value::as_str)
        .filter(|run_id| !run_id.is_empty());
    if let Some(run_id) = structured_run_id {
        return AssistantError::ActiveRun { run_id: RunId::from(run_id) };
    }

    if message.contains(ACTIVE_RUN_MARKER) {
        if let Some(run_id) = extract_run_id(&message) {
            return AssistantError::ActiveRun { run_id };
        }
    }

    AssistantError::Api { status, message }
}

pub(crate) fn extract_run_id(text: &str) -> Option<RunId> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .find(|token| token.starts_with("run_") && token.len() > "run_".len())
        .map(RunId::from)
}

#[derive(Deserialize)]
struct WireThread {
    id: String,
}

#[derive(Deserialize)]
struct WireRun {
    id: String,
    thread_id: String,
    status: String,
    #[serde(default)]
    required_action: Option<WireRequiredAction>,
    #[serde(default)]
    last_error: Option<WireRunError>,
}

#[derive(Deserialize)]
struct WireRequiredAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    submit_tool_outputs: Option<WireSubmitToolOutputs>,
}

#[derive(Deserialize)]
struct WireSubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct WireRunError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct WireMessageList {
    data: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    id: String,
    role: MessageRole,
    created_at: i64,
    #[serde(default)]
    content: Vec<WireContentPart>,
}

#[derive(Deserialize)]
struct WireContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<WireText>,
}

#[derive(Deserialize)]
struct WireText {
    value: String,
}

impl From<WireRun> for Run {
    fn from(wire: WireRun) -> Self {
        let required_action = wire.required_action.map(|action| match action.kind.as_str() {
            "submit_tool_outputs" => RequiredAction::SubmitToolOutputs {
                tool_calls: action
                    .submit_tool_outputs
                    .map(|submit| submit.tool_calls)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|call| ToolCall {
                        id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect(),
            },
            _ => RequiredAction::Other { kind: action.kind },
        });

        Run {
            id: RunId(wire.id),
            thread_id: ThreadId(wire.thread_id),
            status: RunStatus::parse(&wire.status),
            required_action,
            last_error: wire.last_error.map(|error| RunError {
                message: error.message,
                kind: error.kind,
                code: error.code,
            }),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let content = wire
            .content
            .into_iter()
            .map(|part| match (part.kind.as_str(), part.text) {
                ("text", Some(text)) => ContentPart::Text(text.value),
                _ => ContentPart::Other { kind: part.kind },
            })
            .collect();
        Message { id: wire.id, role: wire.role, created_at: wire.created_at, content }
    }
}

fn message_body(message: &NewMessage) -> Value {
    json!({ "role": message.role.as_str(), "content": message.content })
}

#[async_trait]
impl AssistantClient for OpenAiAssistantClient {
    async fn create_thread(
        &self,
        initial_messages: &[NewMessage],
    ) -> Result<ThreadId, AssistantError> {
        let body = if initial_messages.is_empty() {
            json!({})
        } else {
            json!({ "messages": initial_messages.iter().map(message_body).collect::<Vec<_>>() })
        };
        let thread: WireThread = self.send(self.request(Method::POST, "threads").json(&body)).await?;
        Ok(ThreadId(thread.id))
    }

    async fn add_message(
        &self,
        thread_id: &ThreadId,
        message: &NewMessage,
    ) -> Result<(), AssistantError> {
        let path = format!("threads/{thread_id}/messages");
        let request = self.request(Method::POST, &path).json(&message_body(message));
        let _: Value = self.send(request).await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &ThreadId,
        messages: &[NewMessage],
    ) -> Result<Run, AssistantError> {
        let mut body = json!({ "assistant_id": self.assistant_id });
        if !messages.is_empty() {
            body["additional_messages"] =
                Value::Array(messages.iter().map(message_body).collect());
        }
        let path = format!("threads/{thread_id}/runs");
        let run: WireRun = self.send(self.request(Method::POST, &path).json(&body)).await?;
        Ok(run.into())
    }

    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError> {
        let path = format!("threads/{thread_id}/runs/{run_id}");
        let run: WireRun = self.send(self.request(Method::GET, &path)).await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        let path = format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs");
        let body = json!({ "tool_outputs": outputs });
        let run: WireRun = self.send(self.request(Method::POST, &path).json(&body)).await?;
        Ok(run.into())
    }

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>, AssistantError> {
        let path = format!("threads/{thread_id}/messages?order=desc&limit={MESSAGE_PAGE_SIZE}");
        let list: WireMessageList = self.send(self.request(Method::GET, &path)).await?;
        Ok(list.data.into_iter().map(Message::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use concierge_core::config::AssistantConfig;
    use concierge_core::domain::message::{ContentPart, MessageRole, NewMessage};
    use concierge_core::domain::run::{RequiredAction, RunId, RunStatus};
    use concierge_core::domain::thread::ThreadId;
    use concierge_core::domain::tool::ToolOutput;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{
        classify_rejection, extract_run_id, AssistantClient, AssistantError, OpenAiAssistantClient,
    };

    #[derive(Clone, Default)]
    struct Captured {
        bodies: Arc<Mutex<Vec<(String, Value)>>>,
        headers: Arc<Mutex<Vec<HeaderMap>>>,
    }

    async fn create_run(
        State(captured): State<Captured>,
        Path(thread_id): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        captured.headers.lock().await.push(headers);
        captured.bodies.lock().await.push((format!("runs:{thread_id}"), body));
        if thread_id == "thread_busy" {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": {
                    "message": "Thread thread_busy already has an active run run_abc123.",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": null
                } })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({ "id": "run_new", "thread_id": thread_id, "status": "queued" })),
        )
    }

    async fn get_run(Path((thread_id, run_id)): Path<(String, String)>) -> Json<Value> {
        Json(json!({
            "id": run_id,
            "thread_id": thread_id,
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": { "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "get_product_info_by_criteria", "arguments": "{\"product_name\":\"mask\"}" }
                }] }
            },
            "last_error": null
        }))
    }

    async fn submit_outputs(
        State(captured): State<Captured>,
        Path((thread_id, run_id)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        captured.bodies.lock().await.push((format!("submit:{run_id}"), body));
        Json(json!({ "id": run_id, "thread_id": thread_id, "status": "queued" }))
    }

    async fn list_messages(Path(thread_id): Path<String>) -> Json<Value> {
        Json(json!({
            "object": "list",
            "data": [
                { "id": "msg_2", "thread_id": thread_id, "role": "assistant", "created_at": 20,
                  "content": [
                      { "type": "image_file", "image_file": { "file_id": "file_1" } },
                      { "type": "text", "text": { "value": "We stock masks.", "annotations": [] } }
                  ] },
                { "id": "msg_1", "thread_id": thread_id, "role": "user", "created_at": 10,
                  "content": [{ "type": "text", "text": { "value": "masks?", "annotations": [] } }] }
            ],
            "has_more": false
        }))
    }

    async fn create_thread(
        State(captured): State<Captured>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        captured.bodies.lock().await.push(("threads".to_string(), body));
        Json(json!({ "id": "thread_fresh", "object": "thread" }))
    }

    async fn spawn_fake_assistant() -> (OpenAiAssistantClient, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route("/v1/threads", post(create_thread))
            .route("/v1/threads/{thread_id}/runs", post(create_run))
            .route("/v1/threads/{thread_id}/runs/{run_id}", get(get_run))
            .route("/v1/threads/{thread_id}/runs/{run_id}/submit_tool_outputs", post(submit_outputs))
            .route("/v1/threads/{thread_id}/messages", get(list_messages))
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (client_for(&format!("http://{addr}/v1")), captured)
    }

    fn client_for(base_url: &str) -> OpenAiAssistantClient {
        let config = AssistantConfig {
            api_key: "sk-test".to_string().into(),
            assistant_id: "asst_test".to_string(),
            base_url: base_url.to_string(),
            beta_header: "assistants=v2".to_string(),
            timeout_secs: 5,
            poll_interval_ms: 1,
            max_wait_secs: None,
            welcome_message: None,
            thread_preamble: None,
        };
        OpenAiAssistantClient::new(&config).expect("client")
    }

    /// Answers one request with a 200 whose body stops short of its Content-Length.
    async fn spawn_truncating_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else { return };
            let mut request = [0u8; 4096];
            if stream.readable().await.is_ok() {
                let _ = stream.try_read(&mut request);
            }
            let response = b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"id\":\"run_";
            if stream.writable().await.is_ok() {
                let _ = stream.try_write(response);
            }
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn interrupted_response_body_is_a_transport_error() {
        let client = client_for(&spawn_truncating_server().await);

        let error = client
            .get_run(&ThreadId::from("thread_1"), &RunId::from("run_1"))
            .await
            .expect_err("truncated body must fail");

        assert!(matches!(error, AssistantError::Transport(_)), "got {error:?}");
    }

    #[test]
    fn run_id_is_taken_from_first_run_token() {
        assert_eq!(
            extract_run_id("Thread thread_x already has an active run run_abc123."),
            Some(RunId::from("run_abc123"))
        );
        assert_eq!(extract_run_id("no identifiers here"), None);
        assert_eq!(extract_run_id("dangling run_"), None);
    }

    #[test]
    fn structured_active_run_id_takes_precedence_over_message_text() {
        let error = json!({ "message": "conflict", "active_run_id": "run_structured" });
        assert_eq!(
            classify_rejection(409, Some(&error), ""),
            AssistantError::ActiveRun { run_id: RunId::from("run_structured") }
        );
    }

    #[test]
    fn conflict_text_without_run_id_stays_an_api_error() {
        let error = json!({ "message": "Thread thread_x already has an active run." });
        assert_eq!(
            classify_rejection(400, Some(&error), ""),
            AssistantError::Api {
                status: 400,
                message: "Thread thread_x already has an active run.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn create_run_sends_assistant_id_additional_messages_and_headers() {
        let (client, captured) = spawn_fake_assistant().await;

        let run = client
            .create_run(&ThreadId::from("thread_ok"), &[NewMessage::user("hello")])
            .await
            .expect("run should be created");

        assert_eq!(run.id, RunId::from("run_new"));
        assert_eq!(run.status, RunStatus::Queued);

        let bodies = captured.bodies.lock().await;
        assert_eq!(bodies[0].1, json!({
            "assistant_id": "asst_test",
            "additional_messages": [{ "role": "user", "content": "hello" }]
        }));
        let headers = captured.headers.lock().await;
        assert_eq!(headers[0]["openai-beta"], "assistants=v2");
        assert_eq!(headers[0]["authorization"], "Bearer sk-test");
    }

    #[tokio::test]
    async fn active_run_rejection_becomes_structured_conflict() {
        let (client, _) = spawn_fake_assistant().await;

        let error = client
            .create_run(&ThreadId::from("thread_busy"), &[NewMessage::user("hello")])
            .await
            .expect_err("busy thread must conflict");

        assert_eq!(error, AssistantError::ActiveRun { run_id: RunId::from("run_abc123") });
    }

    #[tokio::test]
    async fn get_run_maps_pending_tool_calls() {
        let (client, _) = spawn_fake_assistant().await;

        let run = client
            .get_run(&ThreadId::from("thread_ok"), &RunId::from("run_7"))
            .await
            .expect("run should decode");

        assert_eq!(run.status, RunStatus::RequiresAction);
        let calls = run.pending_tool_calls().expect("tool calls");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_product_info_by_criteria");
        assert_eq!(calls[0].arguments, "{\"product_name\":\"mask\"}");
        assert!(matches!(run.required_action, Some(RequiredAction::SubmitToolOutputs { .. })));
    }

    #[tokio::test]
    async fn submit_tool_outputs_posts_batch() {
        let (client, captured) = spawn_fake_assistant().await;

        client
            .submit_tool_outputs(
                &ThreadId::from("thread_ok"),
                &RunId::from("run_7"),
                &[ToolOutput { tool_call_id: "call_1".into(), output: "none".into() }],
            )
            .await
            .expect("submission should succeed");

        let bodies = captured.bodies.lock().await;
        assert_eq!(bodies[0].0, "submit:run_7");
        assert_eq!(
            bodies[0].1,
            json!({ "tool_outputs": [{ "tool_call_id": "call_1", "output": "none" }] })
        );
    }

    #[tokio::test]
    async fn list_messages_keeps_non_text_parts_in_order() {
        let (client, _) = spawn_fake_assistant().await;

        let messages =
            client.list_messages(&ThreadId::from("thread_ok")).await.expect("messages");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[0].content[0], ContentPart::Other { kind: "image_file".into() });
        assert_eq!(messages[0].first_text(), Some("We stock masks."));
    }

    #[tokio::test]
    async fn create_thread_seeds_initial_messages() {
        let (client, captured) = spawn_fake_assistant().await;

        let thread_id = client
            .create_thread(&[NewMessage::user("you are a helpful assistant")])
            .await
            .expect("thread");

        assert_eq!(thread_id, ThreadId::from("thread_fresh"));
        let bodies = captured.bodies.lock().await;
        assert_eq!(
            bodies[0].1,
            json!({ "messages": [{ "role": "user", "content": "you are a helpful assistant" }] })
        );
    }
}
