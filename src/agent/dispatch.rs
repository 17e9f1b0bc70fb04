//! Pipeline sink that turns segments into outbound events.

use crate::agent::events::OutboundEvent;
use crate::defaults;
use crate::error::StagecueError;
use crate::pipeline::{Consumer, NodeError, Segment, SegmentKind};
use crate::transport::EventSink;
use crate::tts::Synthesizer;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::StreamExt;
use std::sync::Arc;

/// Speaks text segments and forwards tag segments.
///
/// Every segment passes a scheduling point first, so a pending interruption
/// can take effect between segments.
pub struct SegmentDispatcher {
    synthesizer: Arc<dyn Synthesizer>,
    events: Arc<dyn EventSink>,
    streaming: bool,
}

impl SegmentDispatcher {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, events: Arc<dyn EventSink>) -> Self {
        Self {
            synthesizer,
            events,
            streaming: false,
        }
    }

    /// Sends audio chunk by chunk: one `say_aloud` per chunk, the first one
    /// carrying the sentence text and the rest an empty `content`.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Synthesizes and encodes `text`. Failures degrade to no audio.
    async fn speak(&self, text: &str) -> Option<String> {
        match self.synthesizer.synthesize(text).await {
            Ok(audio) if !audio.is_empty() => Some(BASE64.encode(audio)),
            Ok(_) => {
                tracing::debug!("Synthesizer '{}' returned no audio", self.synthesizer.name());
                None
            }
            Err(e) => {
                tracing::warn!("Speech synthesis failed for {:?}: {}", text, e);
                None
            }
        }
    }

    /// A failed chunk ends the sentence's audio. If nothing was sent yet the
    /// text still goes out, without audio.
    async fn speak_streamed(&self, content: String) -> Result<(), NodeError> {
        let mut chunks = self.synthesizer.synthesize_stream(&content);
        let mut sent = 0usize;
        while let Some(chunk) = chunks.next().await {
            let audio = match chunk {
                Ok(audio) if audio.is_empty() => continue,
                Ok(audio) => audio,
                Err(e) => {
                    tracing::warn!(chunk = sent, "Speech synthesis failed for {:?}: {}", content, e);
                    break;
                }
            };
            let text = if sent == 0 { content.clone() } else { String::new() };
            self.emit(say_aloud(text, Some(BASE64.encode(audio)))).await?;
            sent += 1;
        }
        drop(chunks);

        if sent == 0 {
            self.emit(say_aloud(content, None)).await?;
        }
        Ok(())
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), NodeError> {
        self.events.emit(event).await.map_err(|e| match e {
            StagecueError::TransportClosed
            | StagecueError::TransportConnection { .. }
            | StagecueError::TransportProtocol { .. } => NodeError::Fatal(e.to_string()),
            // One event lost, the connection is still usable
            other => NodeError::Recoverable(other.to_string()),
        })
    }
}

fn say_aloud(content: String, media_data: Option<String>) -> OutboundEvent {
    OutboundEvent::SayAloud {
        content,
        media_data,
        format: defaults::AUDIO_FORMAT.to_string(),
    }
}

#[async_trait]
impl Consumer for SegmentDispatcher {
    type Item = Segment;

    async fn consume(&mut self, segment: Segment) -> Result<(), NodeError> {
        tokio::task::yield_now().await;

        match segment.kind {
            SegmentKind::Text => {
                if segment.content.trim().is_empty() {
                    tracing::trace!("Skipping blank text segment");
                    return Ok(());
                }
                if self.streaming {
                    return self.speak_streamed(segment.content).await;
                }
                let media_data = self.speak(&segment.content).await;
                self.emit(say_aloud(segment.content, media_data)).await
            }
            SegmentKind::Tag => {
                self.emit(OutboundEvent::BracketTag {
                    content: segment.content,
                })
                .await
            }
        }
    }

    fn name(&self) -> &'static str {
        "segment_dispatcher"
    }
}
