use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use concierge_core::domain::thread::ConversationKey;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::reply::ReplyClient;
use crate::signature::{verify, SignatureError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    TextMessage(TextMessageEvent),
    Unsupported { event_type: String },
}

impl LineEvent {
    pub fn event_type(&self) -> LineEventType {
        match self {
            Self::TextMessage(_) => LineEventType::TextMessage,
            Self::Unsupported { .. } => LineEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LineEventType {
    TextMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub reply_token: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<WireSource>,
    #[serde(default)]
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSource {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl From<WireEvent> for LineEvent {
    fn from(wire: WireEvent) -> Self {
        let message_kind = wire.message.as_ref().map(|message| message.kind.as_str());
        if wire.kind != "message" || message_kind != Some("text") {
            let event_type = match message_kind {
                Some(kind) if wire.kind == "message" => format!("message/{kind}"),
                _ => wire.kind,
            };
            return Self::Unsupported { event_type };
        }

        let user_id = wire.source.and_then(|source| source.user_id);
        let text = wire.message.and_then(|message| message.text);
        match (wire.reply_token, user_id, text) {
            (Some(reply_token), Some(user_id), Some(text)) => {
                Self::TextMessage(TextMessageEvent { reply_token, user_id, text })
            }
            _ => Self::Unsupported { event_type: "message/text-incomplete".to_string() },
        }
    }
}

pub fn parse_events(body: &[u8]) -> Result<Vec<LineEvent>, WebhookError> {
    let parsed: WebhookBody =
        serde_json::from_slice(body).map_err(|error| WebhookError::Payload(error.to_string()))?;
    Ok(parsed.events.into_iter().map(LineEvent::from).collect())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: Uuid::new_v4().to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied,
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("malformed webhook payload: {0}")]
    Payload(String),
}

/// Produces the reply text for one user message. Implementations must not fail;
/// errors are folded into the reply (the agent answers with a fixed apology).
#[async_trait]
pub trait MessageResponder: Send + Sync {
    async fn respond(&self, key: &ConversationKey, text: &str) -> String;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> LineEventType;
    async fn handle(&self, event: &LineEvent, ctx: &EventContext) -> HandlerResult;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<LineEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(&self, event: &LineEvent, ctx: &EventContext) -> HandlerResult {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            debug!(
                event_name = "line.event.ignored",
                correlation_id = %ctx.correlation_id,
                event_type = ?event.event_type(),
                "no handler for event"
            );
            return HandlerResult::Ignored;
        };

        handler.handle(event, ctx).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Runs the conversation turn for a text message and sends the reply.
pub struct TextMessageHandler<S, R> {
    responder: S,
    replies: R,
}

impl<S, R> TextMessageHandler<S, R>
where
    S: MessageResponder,
    R: ReplyClient,
{
    pub fn new(responder: S, replies: R) -> Self {
        Self { responder, replies }
    }
}

#[async_trait]
impl<S, R> EventHandler for TextMessageHandler<S, R>
where
    S: MessageResponder + 'static,
    R: ReplyClient + 'static,
{
    fn event_type(&self) -> LineEventType {
        LineEventType::TextMessage
    }

    async fn handle(&self, event: &LineEvent, ctx: &EventContext) -> HandlerResult {
        let LineEvent::TextMessage(message) = event else {
            return HandlerResult::Ignored;
        };

        let key = ConversationKey(message.user_id.clone());
        let reply = self.responder.respond(&key, &message.text).await;
        if reply.trim().is_empty() {
            warn!(
                event_name = "line.reply.skipped_empty",
                correlation_id = %ctx.correlation_id,
                conversation_key = %key,
                "assistant produced no text; nothing to reply"
            );
            return HandlerResult::Processed;
        }

        match self.replies.reply(&message.reply_token, &reply).await {
            Ok(()) => {
                info!(
                    event_name = "line.reply.sent",
                    correlation_id = %ctx.correlation_id,
                    conversation_key = %key,
                    reply_len = reply.len(),
                    "reply sent"
                );
                HandlerResult::Replied
            }
            Err(error) => {
                warn!(
                    event_name = "line.reply.failed",
                    correlation_id = %ctx.correlation_id,
                    conversation_key = %key,
                    error = %error,
                    "failed to send reply"
                );
                HandlerResult::Processed
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebhookSummary {
    pub received: usize,
    pub replied: usize,
    pub ignored: usize,
}

/// Verifies and dispatches one webhook delivery. Events are handled in order,
/// one at a time.
pub struct WebhookProcessor {
    channel_secret: SecretString,
    dispatcher: EventDispatcher,
}

impl WebhookProcessor {
    pub fn new(channel_secret: SecretString, dispatcher: EventDispatcher) -> Self {
        Self { channel_secret, dispatcher }
    }

    pub async fn process(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookSummary, WebhookError> {
        let ctx = EventContext::default();
        let secret = self.channel_secret.expose_secret().as_bytes();
        if let Err(error) = verify(secret, body, signature) {
            warn!(
                event_name = "line.webhook.rejected",
                correlation_id = %ctx.correlation_id,
                reason = %error,
                "webhook signature check failed"
            );
            return Err(error.into());
        }

        let events = parse_events(body)?;
        let mut summary = WebhookSummary { received: events.len(), ..WebhookSummary::default() };
        for event in &events {
            match self.dispatcher.dispatch(event, &ctx).await {
                HandlerResult::Replied => summary.replied += 1,
                HandlerResult::Ignored => summary.ignored += 1,
                HandlerResult::Processed => {}
            }
        }

        info!(
            event_name = "line.webhook.processed",
            correlation_id = %ctx.correlation_id,
            received = summary.received,
            replied = summary.replied,
            ignored = summary.ignored,
            "webhook processed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use concierge_core::domain::thread::ConversationKey;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    use super::{
        parse_events, EventContext, EventDispatcher, HandlerResult, LineEvent, MessageResponder,
        TextMessageEvent, TextMessageHandler, WebhookError, WebhookProcessor,
    };
    use crate::reply::{ReplyClient, ReplyError};
    use crate::signature::{sign, SignatureError};

    const SECRET: &str = "channel-secret";

    #[derive(Clone, Default)]
    struct EchoResponder {
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl MessageResponder for EchoResponder {
        async fn respond(&self, key: &ConversationKey, text: &str) -> String {
            self.seen.lock().await.push((key.0.clone(), text.to_string()));
            if text == "silence" {
                return String::new();
            }
            format!("echo: {text}")
        }
    }

    #[derive(Clone, Default)]
    struct RecordingReplies {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplyClient for RecordingReplies {
        async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
            if self.fail {
                return Err(ReplyError::Api { status: 400, body: "Invalid reply token".into() });
            }
            self.sent.lock().await.push((reply_token.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn processor(responder: EchoResponder, replies: RecordingReplies) -> WebhookProcessor {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(responder, replies));
        WebhookProcessor::new(SECRET.to_string().into(), dispatcher)
    }

    const BODY: &str = r#"{
        "destination": "Uabc",
        "events": [
            { "type": "follow", "replyToken": "r0", "source": { "type": "user", "userId": "U1" } },
            { "type": "message", "replyToken": "r1", "source": { "type": "user", "userId": "U1" },
              "message": { "id": "m1", "type": "text", "text": "do you sell gloves?" } },
            { "type": "message", "replyToken": "r2", "source": { "type": "user", "userId": "U2" },
              "message": { "id": "m2", "type": "sticker", "packageId": "1", "stickerId": "1" } }
        ]
    }"#;

    #[test]
    fn parses_text_messages_and_marks_everything_else_unsupported() {
        let events = parse_events(BODY.as_bytes()).expect("body should parse");

        assert_eq!(
            events,
            vec![
                LineEvent::Unsupported { event_type: "follow".into() },
                LineEvent::TextMessage(TextMessageEvent {
                    reply_token: "r1".into(),
                    user_id: "U1".into(),
                    text: "do you sell gloves?".into(),
                }),
                LineEvent::Unsupported { event_type: "message/sticker".into() },
            ]
        );
    }

    #[test]
    fn malformed_json_is_a_payload_error() {
        assert!(matches!(parse_events(b"{not json"), Err(WebhookError::Payload(_))));
        assert_eq!(parse_events(b"{}").expect("empty body"), Vec::new());
    }

    #[tokio::test]
    async fn valid_delivery_replies_to_each_text_message() {
        let responder = EchoResponder::default();
        let replies = RecordingReplies::default();
        let processor = processor(responder.clone(), replies.clone());
        let signature = sign(SECRET.as_bytes(), BODY.as_bytes());

        let summary =
            processor.process(Some(&signature), BODY.as_bytes()).await.expect("processed");

        assert_eq!(summary.received, 3);
        assert_eq!(summary.replied, 1);
        assert_eq!(summary.ignored, 2);
        assert_eq!(
            *responder.seen.lock().await,
            vec![("U1".to_string(), "do you sell gloves?".to_string())]
        );
        assert_eq!(
            *replies.sent.lock().await,
            vec![("r1".to_string(), "echo: do you sell gloves?".to_string())]
        );
    }

    #[tokio::test]
    async fn bad_signature_rejects_before_any_handling() {
        let responder = EchoResponder::default();
        let processor = processor(responder.clone(), RecordingReplies::default());

        let error = processor
            .process(Some("bm90IHRoZSBzaWduYXR1cmU="), BODY.as_bytes())
            .await
            .expect_err("must reject");

        assert_eq!(error, WebhookError::Signature(SignatureError::Mismatch));
        assert!(responder.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn reply_failure_is_swallowed() {
        let replies = RecordingReplies { fail: true, ..RecordingReplies::default() };
        let handler = TextMessageHandler::new(EchoResponder::default(), replies);
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(handler);

        let event = LineEvent::TextMessage(TextMessageEvent {
            reply_token: "r1".into(),
            user_id: "U1".into(),
            text: "hello".into(),
        });
        let result = dispatcher.dispatch(&event, &EventContext::default()).await;

        assert_eq!(result, HandlerResult::Processed);
    }

    #[tokio::test]
    async fn empty_reply_is_not_sent() {
        let replies = RecordingReplies::default();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(EchoResponder::default(), replies.clone()));

        let event = LineEvent::TextMessage(TextMessageEvent {
            reply_token: "r1".into(),
            user_id: "U1".into(),
            text: "silence".into(),
        });
        let result = dispatcher.dispatch(&event, &EventContext::default()).await;

        assert_eq!(result, HandlerResult::Processed);
        assert!(replies.sent.lock().await.is_empty());
        assert_eq!(dispatcher.handler_count(), 1);
    }
}
