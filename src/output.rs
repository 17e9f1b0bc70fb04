//! Terminal rendering of outbound events.
//! Used by `stagecue chat` in place of a server connection.

use crate::agent::OutboundEvent;
use crate::error::Result;
use crate::pipeline::{Segment, SegmentKind};
use crate::transport::EventSink;
use async_trait::async_trait;
use std::io::{self, Write};

const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const MAGENTA: &str = "\x1b[35m";
const RESET: &str = "\x1b[0m";

/// Formats one event for the console. Returns `None` for events with no
/// visible output.
pub fn format_event(event: &OutboundEvent, color: bool) -> Option<String> {
    let (dim, cyan, magenta, reset) = if color {
        (DIM, CYAN, MAGENTA, RESET)
    } else {
        ("", "", "", "")
    };

    match event {
        OutboundEvent::StartOfResponse => Some(format!("{cyan}>{reset} ")),
        OutboundEvent::SayAloud {
            content,
            media_data,
            ..
        } => {
            let audio = match media_data {
                Some(data) => format!("{dim}[{} KB]{reset}", data.len() * 3 / 4 / 1024),
                None => format!("{dim}[no audio]{reset}"),
            };
            Some(format!("{content}{audio} "))
        }
        OutboundEvent::BracketTag { content } => Some(format!("{magenta}[{content}]{reset} ")),
        OutboundEvent::EndOfResponse { .. } => Some("\n".to_string()),
    }
}

/// One segment as a line of JSON, for `stagecue segment`.
pub fn format_segment(segment: &Segment) -> String {
    match serde_json::to_string(segment) {
        Ok(json) => json,
        Err(_) => match segment.kind {
            SegmentKind::Text => segment.content.clone(),
            SegmentKind::Tag => format!("[{}]", segment.content),
        },
    }
}

/// Prints events to stdout as they arrive.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleEventSink {
    color: bool,
}

impl ConsoleEventSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

#[async_trait]
impl EventSink for ConsoleEventSink {
    async fn emit(&self, event: OutboundEvent) -> Result<()> {
        if let Some(text) = format_event(&event, self.color) {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_plain_events() {
        let say = OutboundEvent::SayAloud {
            content: "你好".to_string(),
            media_data: None,
            format: "wav".to_string(),
        };
        assert_eq!(format_event(&say, false).as_deref(), Some("你好[no audio] "));

        let tag = OutboundEvent::BracketTag {
            content: "wink".to_string(),
        };
        assert_eq!(format_event(&tag, false).as_deref(), Some("[wink] "));

        let end = OutboundEvent::EndOfResponse {
            response: "x".to_string(),
        };
        assert_eq!(format_event(&end, false).as_deref(), Some("\n"));
    }

    #[test]
    fn test_format_colored_tag() {
        let tag = OutboundEvent::BracketTag {
            content: "点头".to_string(),
        };
        let text = format_event(&tag, true).unwrap();
        assert!(text.starts_with(MAGENTA));
        assert!(text.contains("[点头]"));
    }

    #[test]
    fn test_audio_size_estimate() {
        let say = OutboundEvent::SayAloud {
            content: "a".to_string(),
            media_data: Some("A".repeat(4096)),
            format: "wav".to_string(),
        };
        assert_eq!(format_event(&say, false).as_deref(), Some("a[3 KB] "));
    }

    #[test]
    fn test_format_segment_json() {
        assert_eq!(
            format_segment(&Segment::tag("点头")),
            r#"{"kind":"tag","content":"点头"}"#
        );
    }
}
