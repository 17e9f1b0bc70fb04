//! Wire events exchanged with the stage server, and the inbound event bus.
//!
//! Every message on the socket is a JSON envelope `{"type": "event", "data": {...}}`
//! whose `data.type` names the event.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

/// Events sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    StartOfResponse,
    /// Speakable text with its audio, base64 encoded. `media_data` is null
    /// when synthesis failed or produced nothing.
    SayAloud {
        content: String,
        media_data: Option<String>,
        format: String,
    },
    BracketTag {
        content: String,
    },
    EndOfResponse {
        response: String,
    },
}

impl OutboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartOfResponse => "start_of_response",
            Self::SayAloud { .. } => "say_aloud",
            Self::BracketTag { .. } => "bracket_tag",
            Self::EndOfResponse { .. } => "end_of_response",
        }
    }

    /// Wraps the event in its envelope and serializes it.
    pub fn to_envelope_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&EventEnvelope::new(self))
    }
}

/// `{"type": "event", "data": <event>}`
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a OutboundEvent,
}

impl<'a> EventEnvelope<'a> {
    pub fn new(data: &'a OutboundEvent) -> Self {
        Self {
            kind: "event",
            data,
        }
    }
}

/// Events received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    UserInput {
        #[serde(default)]
        content: String,
    },
}

/// Discriminant used to route inbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserInput,
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UserInput { .. } => EventKind::UserInput,
        }
    }
}

/// A decoded inbound message. `time` is informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub time: String,
    pub event: InboundEvent,
}

/// Decodes one inbound text frame.
///
/// Returns `None` for anything that is not a well-formed known event:
/// invalid JSON, missing `data`, missing or unknown `data.type`, wrong field
/// types. Such messages are dropped without reply.
pub fn parse_inbound(text: &str) -> Option<InboundMessage> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Dropping non-JSON message: {}", e);
            return None;
        }
    };

    let Some(data) = value.get("data").filter(|d| d.is_object()) else {
        tracing::debug!("Dropping message without data object");
        return None;
    };
    if !data.get("type").is_some_and(Value::is_string) {
        tracing::debug!("Dropping message without data.type");
        return None;
    }

    let event = match InboundEvent::deserialize(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Dropping unrecognized event: {}", e);
            return None;
        }
    };

    let time = value
        .get("time")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(InboundMessage { time, event })
}

type Handler = Box<dyn FnMut(InboundMessage) -> BoxFuture<'static, ()> + Send>;

/// Routes inbound events to async handlers.
///
/// Handlers registered for the same kind run one after another in
/// registration order; each is awaited before the next starts.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, Fut>(&mut self, kind: EventKind, mut handler: F) -> &mut Self
    where
        F: FnMut(InboundMessage) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers
            .entry(kind)
            .or_default()
            .push(Box::new(move |message| handler(message).boxed()));
        self
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Runs every handler for the message's kind. Returns how many ran.
    pub async fn dispatch(&mut self, message: InboundMessage) -> usize {
        let Some(handlers) = self.handlers.get_mut(&message.event.kind()) else {
            tracing::debug!("No handler for {:?}", message.event.kind());
            return 0;
        };
        for handler in handlers.iter_mut() {
            handler(message.clone()).await;
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Collector;

    #[test]
    fn test_outbound_envelopes() {
        let say = OutboundEvent::SayAloud {
            content: "你好".to_string(),
            media_data: Some("UklGRg==".to_string()),
            format: "wav".to_string(),
        };
        let value: Value = serde_json::from_str(&say.to_envelope_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "event",
                "data": {"type": "say_aloud", "content": "你好", "media_data": "UklGRg==", "format": "wav"}
            })
        );

        let start: Value =
            serde_json::from_str(&OutboundEvent::StartOfResponse.to_envelope_json().unwrap())
                .unwrap();
        assert_eq!(
            start,
            serde_json::json!({"type": "event", "data": {"type": "start_of_response"}})
        );
    }

    #[test]
    fn test_failed_audio_serializes_as_null() {
        let say = OutboundEvent::SayAloud {
            content: "x".to_string(),
            media_data: None,
            format: "wav".to_string(),
        };
        let value: Value = serde_json::from_str(&say.to_envelope_json().unwrap()).unwrap();
        assert_eq!(value["data"]["media_data"], Value::Null);
        assert_eq!(say.kind(), "say_aloud");
    }

    #[test]
    fn test_parse_user_input() {
        let message = parse_inbound(
            r#"{"type":"event","time":"2024-05-01T10:00:00","data":{"type":"user_input","content":"你好"}}"#,
        )
        .unwrap();
        assert_eq!(message.time, "2024-05-01T10:00:00");
        assert_eq!(
            message.event,
            InboundEvent::UserInput {
                content: "你好".to_string()
            }
        );
    }

    #[test]
    fn test_parse_missing_content_is_blank_input() {
        let message = parse_inbound(r#"{"data":{"type":"user_input"}}"#).unwrap();
        assert_eq!(message.time, "");
        assert_eq!(
            message.event,
            InboundEvent::UserInput {
                content: String::new()
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "not json",
            "[]",
            r#"{"type":"event"}"#,
            r#"{"data":"user_input"}"#,
            r#"{"data":{"content":"x"}}"#,
            r#"{"data":{"type":42}}"#,
            r#"{"data":{"type":"unknown_event"}}"#,
            r#"{"data":{"type":"user_input","content":7}}"#,
        ] {
            assert_eq!(parse_inbound(text), None, "accepted {text}");
        }
    }

    #[tokio::test]
    async fn test_bus_runs_handlers_in_order() {
        let log = Collector::new();
        let mut bus = EventBus::new();
        for name in ["first", "second"] {
            let log = log.clone();
            bus.on(EventKind::UserInput, move |message: InboundMessage| {
                let log = log.clone();
                async move {
                    if let InboundEvent::UserInput { content } = message.event {
                        log.push(format!("{name}:{content}"));
                    }
                }
            });
        }

        let ran = bus
            .dispatch(InboundMessage {
                time: String::new(),
                event: InboundEvent::UserInput {
                    content: "hi".to_string(),
                },
            })
            .await;

        assert_eq!(ran, 2);
        assert_eq!(bus.handler_count(EventKind::UserInput), 2);
        assert_eq!(log.items(), vec!["first:hi", "second:hi"]);
    }

    #[tokio::test]
    async fn test_bus_without_handlers_ignores_event() {
        let mut bus = EventBus::new();
        let ran = bus
            .dispatch(InboundMessage {
                time: String::new(),
                event: InboundEvent::UserInput {
                    content: "x".to_string(),
                },
            })
            .await;
        assert_eq!(ran, 0);
    }
}
