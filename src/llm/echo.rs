//! Offline model that streams the last user message back.

use crate::llm::{ChatMessage, LanguageModel, ModelEvent, ModelStream, Role};
use futures_util::StreamExt;
use futures_util::stream;

/// Echoes the latest user entry in fixed-size character chunks.
///
/// Useful for exercising the pipeline and transport without network access.
#[derive(Debug, Clone)]
pub struct EchoModel {
    chunk_chars: usize,
}

impl EchoModel {
    pub fn new(chunk_chars: usize) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
        }
    }
}

impl LanguageModel for EchoModel {
    fn respond(&self, context: Vec<ChatMessage>) -> ModelStream {
        let text = context
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let chars: Vec<char> = text.chars().collect();
        let mut events = vec![ModelEvent::StartOfResponse];
        events.extend(
            chars
                .chunks(self.chunk_chars)
                .map(|chunk| ModelEvent::MessageDelta(chunk.iter().collect())),
        );
        events.push(ModelEvent::Done(text));
        stream::iter(events).boxed()
    }

    fn name(&self) -> &str {
        "echo"
    }
}
