//! WebSocket client connecting the agent to the stage server.

use crate::agent::{EventBus, EventKind, InboundEvent, InboundMessage, OrchestratorConfig};
use crate::agent::{OutboundEvent, ResponseOrchestrator, parse_inbound};
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, StagecueError};
use crate::llm::create_model;
use crate::transport::ChannelEventSink;
use crate::tts::create_synthesizer;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

/// Turns a configured server address into a WebSocket base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, a bare host gets `ws://`.
/// Trailing slashes are removed.
pub fn normalize_server_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{}", url)
    }
}

/// Endpoint the agent named `name` connects to.
pub fn agent_endpoint(server_url: &str, name: &str) -> String {
    format!("{}/ws/agent/{}", normalize_server_url(server_url), name)
}

/// Routes `user_input` events to the orchestrator.
pub fn agent_event_bus(orchestrator: Arc<Mutex<ResponseOrchestrator>>) -> EventBus {
    let mut bus = EventBus::new();
    bus.on(EventKind::UserInput, move |message: InboundMessage| {
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            let InboundEvent::UserInput { content } = message.event;
            tracing::debug!(time = %message.time, "User input received");
            orchestrator.lock().await.on_user_input(&content).await;
        }
    });
    bus
}

/// Connects to the server and serves the conversation until it closes.
pub async fn run_agent(config: &Config) -> Result<()> {
    let model = create_model(&config.llm)?;
    let synthesizer = create_synthesizer(&config.tts)?;
    let endpoint = agent_endpoint(&config.agent.server_url, &config.agent.name);

    let (socket, _) =
        connect_async(endpoint.as_str())
            .await
            .map_err(|e| StagecueError::TransportConnection {
                message: format!("{}: {}", endpoint, e),
            })?;
    tracing::info!(%endpoint, model = model.name(), tts = synthesizer.name(), "Connected");

    let (write, read) = socket.split();
    let (tx, rx) = mpsc::channel(defaults::OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_events(write, rx));

    let orchestrator = ResponseOrchestrator::new(
        model,
        synthesizer,
        Arc::new(ChannelEventSink::new(tx)),
        OrchestratorConfig::from(config),
    )?;
    let orchestrator = Arc::new(Mutex::new(orchestrator));
    let mut bus = agent_event_bus(Arc::clone(&orchestrator));

    let result = read_events(read, &mut bus).await;

    orchestrator.lock().await.interrupt().await;
    drop(bus);
    drop(orchestrator);
    match writer.await {
        Ok(Err(e)) => tracing::warn!("Event writer stopped: {}", e),
        Err(e) => tracing::warn!("Event writer task failed: {}", e),
        Ok(Ok(())) => {}
    }
    tracing::info!(%endpoint, "Disconnected");
    result
}

/// Dispatches inbound frames until the peer closes the connection.
///
/// Malformed messages are dropped. Each event is fully handled before the
/// next frame is read.
pub async fn read_events<S>(mut read: S, bus: &mut EventBus) -> Result<()>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Some(message) = parse_inbound(text.as_str()) {
                    bus.dispatch(message).await;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!("Server closed the connection");
                return Ok(());
            }
            Ok(_) => {}
            Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
            Err(e) => {
                return Err(StagecueError::TransportProtocol {
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Serializes queued events onto the socket in order.
pub async fn write_events<S>(mut write: S, mut rx: mpsc::Receiver<OutboundEvent>) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(event) = rx.recv().await {
        let json = event.to_envelope_json()?;
        tracing::trace!(kind = event.kind(), "Sending event");
        write
            .send(Message::text(json))
            .await
            .map_err(|_| StagecueError::TransportClosed)?;
    }
    // Ignore close failures: the peer may already be gone
    if let Err(e) = write.close().await {
        tracing::debug!("Close after last event failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedModel, ScriptedTurn};
    use crate::transport::CollectorEventSink;
    use crate::tts::SilentSynthesizer;
    use futures_util::stream;

    #[test]
    fn test_normalize_server_url() {
        assert_eq!(normalize_server_url("localhost:8000"), "ws://localhost:8000");
        assert_eq!(normalize_server_url("http://a.b:1/"), "ws://a.b:1");
        assert_eq!(normalize_server_url("https://a.b"), "wss://a.b");
        assert_eq!(normalize_server_url("wss://a.b//"), "wss://a.b");
        assert_eq!(normalize_server_url("ws://a.b"), "ws://a.b");
    }

    #[test]
    fn test_agent_endpoint() {
        assert_eq!(
            agent_endpoint("https://stage.example.com/", "raspberry"),
            "wss://stage.example.com/ws/agent/raspberry"
        );
    }

    #[tokio::test]
    async fn test_read_events_dispatches_valid_frames_only() {
        let model = ScriptedModel::new([ScriptedTurn::reply(["嗯。"])]);
        let events = CollectorEventSink::new();
        let orchestrator = ResponseOrchestrator::new(
            Arc::new(model.clone()),
            Arc::new(SilentSynthesizer),
            Arc::new(events.clone()),
            OrchestratorConfig::default(),
        )
        .unwrap();
        let orchestrator = Arc::new(Mutex::new(orchestrator));
        let mut bus = agent_event_bus(Arc::clone(&orchestrator));

        let frames = stream::iter(vec![
            Ok(Message::text("garbage".to_string())),
            Ok(Message::text(
                r#"{"type":"event","data":{"type":"nope"}}"#.to_string(),
            )),
            Ok(Message::text(
                r#"{"type":"event","data":{"type":"user_input","content":"hi"}}"#.to_string(),
            )),
            Ok(Message::Close(None)),
            Ok(Message::text(
                r#"{"type":"event","data":{"type":"user_input","content":"late"}}"#.to_string(),
            )),
        ]);

        read_events(frames, &mut bus).await.unwrap();
        orchestrator.lock().await.wait_for_idle().await;

        assert_eq!(model.contexts().len(), 1);
        assert_eq!(
            events.kinds(),
            vec!["start_of_response", "say_aloud", "end_of_response"]
        );
    }

    #[tokio::test]
    async fn test_write_events_sends_envelopes_in_order() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(OutboundEvent::StartOfResponse).await.unwrap();
        tx.send(OutboundEvent::EndOfResponse {
            response: "x".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        let mut sink = Vec::<Message>::new()
            .sink_map_err(|never: std::convert::Infallible| -> tungstenite::Error { match never {} });
        write_events(&mut sink, rx).await.unwrap();

        let sent = sink.into_inner();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            Message::text(r#"{"type":"event","data":{"type":"start_of_response"}}"#.to_string())
        );
    }
}
