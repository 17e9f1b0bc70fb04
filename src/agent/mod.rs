//! Conversation agent: history, wire events and the response orchestrator.

pub mod dispatch;
pub mod events;
pub mod history;
pub mod orchestrator;

pub use dispatch::SegmentDispatcher;
pub use events::{
    EventBus, EventEnvelope, EventKind, InboundEvent, InboundMessage, OutboundEvent,
    parse_inbound,
};
pub use history::ConversationHistory;
pub use orchestrator::{OrchestratorConfig, ResponseOrchestrator, TurnState};
