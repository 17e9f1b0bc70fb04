//! Outbound event sinks and the WebSocket client.

pub mod sink;
pub mod websocket;

pub use sink::{ChannelEventSink, CollectorEventSink, EventSink};
pub use websocket::{agent_endpoint, agent_event_bus, normalize_server_url, run_agent};
