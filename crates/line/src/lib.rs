//! LINE Messaging API channel adapter
//!
//! - **Signature** (`signature`) - `x-line-signature` HMAC-SHA256 verification
//! - **Events** (`events`) - webhook body parsing and per-event dispatch
//! - **Reply** (`reply`) - Reply API client used to answer each text message
//!
//! # Flow
//!
//! ```text
//! POST /webhook/line → WebhookProcessor (verify, parse) → EventDispatcher
//!        → TextMessageHandler → MessageResponder (agent) → ReplyClient
//! ```

pub mod events;
pub mod reply;
pub mod signature;

pub use events::{
    EventContext, EventDispatcher, HandlerResult, LineEvent, LineEventType, MessageResponder,
    TextMessageEvent, TextMessageHandler, WebhookError, WebhookProcessor, WebhookSummary,
};
pub use reply::{LineReplyClient, ReplyClient, ReplyError};
pub use signature::{sign, verify, SignatureError, SIGNATURE_HEADER};
