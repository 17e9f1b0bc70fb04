//! Streaming chat client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Works against OpenAI itself and against compatible hosts such as Zhipu GLM.
//! The response is read as server-sent events; each `data:` line carries one
//! JSON chunk and the stream ends with `data: [DONE]`.

use crate::error::{Result, StagecueError};
use crate::llm::{ChatMessage, LanguageModel, ModelEvent, ModelStream};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde::Deserialize;
use std::collections::VecDeque;

/// Chat model reached over HTTP with SSE streaming.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            system_prompt: None,
        }
    }

    /// Sets the system prompt placed before the history on every call.
    /// An empty prompt is ignored.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Some(prompt.to_string()).filter(|p| !p.trim().is_empty());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, context: &[ChatMessage]) -> serde_json::Value {
        let mut messages = Vec::with_capacity(context.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.as_str()));
        }
        messages.extend_from_slice(context);
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        })
    }
}

impl LanguageModel for OpenAiChatModel {
    fn respond(&self, context: Vec<ChatMessage>) -> ModelStream {
        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&context));

        let turn = SseTurn::new(request);
        stream::unfold(turn, |mut turn| async move {
            let event = turn.next_event().await?;
            Some((event, turn))
        })
        .boxed()
    }

    fn name(&self) -> &str {
        &self.model
    }
}

type ByteStream = BoxStream<'static, reqwest::Result<Vec<u8>>>;

enum Phase {
    Start(reqwest::RequestBuilder),
    Connect(reqwest::RequestBuilder),
    Read(ByteStream),
    Finished,
}

/// State of one streamed turn.
struct SseTurn {
    phase: Phase,
    line_buffer: Vec<u8>,
    pending: VecDeque<String>,
    saw_done: bool,
    response: String,
}

impl SseTurn {
    fn new(request: reqwest::RequestBuilder) -> Self {
        Self {
            phase: Phase::Start(request),
            line_buffer: Vec::new(),
            pending: VecDeque::new(),
            saw_done: false,
            response: String::new(),
        }
    }

    async fn next_event(&mut self) -> Option<ModelEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Start(request) => {
                    self.phase = Phase::Connect(request);
                    return Some(ModelEvent::StartOfResponse);
                }
                Phase::Connect(request) => match connect(request).await {
                    Ok(body) => self.phase = Phase::Read(body),
                    Err(e) => {
                        tracing::warn!("Chat request failed: {}", e);
                        return Some(self.finish());
                    }
                },
                Phase::Read(mut body) => {
                    if let Some(delta) = self.pending.pop_front() {
                        self.phase = Phase::Read(body);
                        self.response.push_str(&delta);
                        return Some(ModelEvent::MessageDelta(delta));
                    }
                    if self.saw_done {
                        return Some(self.finish());
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => {
                            if let Err(e) = self.feed(&chunk) {
                                tracing::warn!("Chat stream failed: {}", e);
                                return Some(self.finish());
                            }
                            self.phase = Phase::Read(body);
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Chat stream interrupted: {}", e);
                            return Some(self.finish());
                        }
                        None => {
                            if let Err(e) = self.feed(b"\n") {
                                tracing::warn!("Chat stream failed: {}", e);
                                return Some(self.finish());
                            }
                            if self.pending.is_empty() {
                                if !self.saw_done {
                                    tracing::debug!("Chat stream ended without [DONE]");
                                }
                                return Some(self.finish());
                            }
                            self.saw_done = true;
                            self.phase = Phase::Read(stream::empty().boxed());
                        }
                    }
                }
                Phase::Finished => return None,
            }
        }
    }

    /// Splits received bytes into lines. Bytes are buffered until a full line
    /// arrives so multibyte characters split across chunks survive.
    ///
    /// An error object in the stream ends the turn; deltas queued before it
    /// are discarded along with it.
    fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        self.line_buffer.extend_from_slice(chunk);
        while let Some(pos) = self.line_buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.line_buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            match parse_sse_line(&line) {
                SseLine::Delta(delta) => self.pending.push_back(delta),
                SseLine::Done => self.saw_done = true,
                SseLine::Failed(message) => {
                    self.pending.clear();
                    return Err(StagecueError::ModelProtocol { message });
                }
                SseLine::Ignore => {}
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ModelEvent {
        self.phase = Phase::Finished;
        ModelEvent::Done(std::mem::take(&mut self.response))
    }
}

async fn connect(request: reqwest::RequestBuilder) -> Result<ByteStream> {
    let response = request
        .send()
        .await
        .map_err(|e| StagecueError::ModelRequest {
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StagecueError::ModelRequest {
            message: format!("HTTP {}: {}", status, body.trim()),
        });
    }

    Ok(response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed())
}

/// Meaning of one SSE line.
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Delta(String),
    Done,
    /// The host reported an error inside the stream.
    Failed(String),
    Ignore,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim_end_matches(['\r', '\n']).strip_prefix("data:") else {
        return SseLine::Ignore;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(CompletionChunk {
            error: Some(error), ..
        }) => SseLine::Failed(error.message),
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map_or(SseLine::Ignore, SseLine::Delta),
        Err(e) => {
            tracing::debug!("Skipping malformed stream chunk: {}", e);
            SseLine::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_parse_delta_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"你好"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta("你好".to_string()));
    }

    #[test]
    fn test_parse_done_line() {
        assert_eq!(parse_sse_line("data: [DONE]\n"), SseLine::Done);
        assert_eq!(parse_sse_line("data:[DONE]\r\n"), SseLine::Done);
    }

    #[test]
    fn test_parse_ignores_role_only_and_comments() {
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only), SseLine::Ignore);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Ignore);
        assert_eq!(parse_sse_line(""), SseLine::Ignore);
        assert_eq!(parse_sse_line("data: {not json"), SseLine::Ignore);
    }

    #[test]
    fn test_feed_handles_split_multibyte_chars() {
        let mut turn = SseTurn::new(reqwest::Client::new().get("http://localhost"));
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"好\"}}]}\n".as_bytes();
        let split = line.len() - 8;
        turn.feed(&line[..split]).unwrap();
        assert!(turn.pending.is_empty());
        turn.feed(&line[split..]).unwrap();
        assert_eq!(turn.pending.pop_front(), Some("好".to_string()));
    }

    #[test]
    fn test_feed_records_done_marker() {
        let mut turn = SseTurn::new(reqwest::Client::new().get("http://localhost"));
        turn.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n")
            .unwrap();
        assert_eq!(turn.pending.len(), 1);
        assert!(turn.saw_done);
    }

    #[test]
    fn test_error_chunk_is_protocol_error() {
        let line = r#"data: {"error":{"message":"rate limited","code":"1302"}}"#;
        assert_eq!(parse_sse_line(line), SseLine::Failed("rate limited".to_string()));

        let mut turn = SseTurn::new(reqwest::Client::new().get("http://localhost"));
        let chunk = format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"a\"}}}}]}}\n{}\n",
            line
        );
        assert!(matches!(
            turn.feed(chunk.as_bytes()),
            Err(StagecueError::ModelProtocol { ref message }) if message == "rate limited"
        ));
        assert!(turn.pending.is_empty());
    }

    #[test]
    fn test_request_body_prepends_system_prompt() {
        let model =
            OpenAiChatModel::new("key", "gpt-test", "https://example.com/v1/").with_system_prompt("be brief");
        let body = model.request_body(&[ChatMessage::user("hi")]);

        assert_eq!(model.endpoint(), "https://example.com/v1/chat/completions");
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_blank_system_prompt_is_omitted() {
        let model = OpenAiChatModel::new("key", "m", "http://x").with_system_prompt("  ");
        let body = model.request_body(&[ChatMessage::new(Role::Assistant, "a")]);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_unreachable_host_still_ends_with_done() {
        let model = OpenAiChatModel::new("key", "m", "http://127.0.0.1:9");
        let events: Vec<ModelEvent> = model.respond(vec![ChatMessage::user("hi")]).collect().await;
        assert_eq!(
            events,
            vec![ModelEvent::StartOfResponse, ModelEvent::Done(String::new())]
        );
    }
}
