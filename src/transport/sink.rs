//! Destinations for outbound events.

use crate::agent::events::OutboundEvent;
use crate::error::{Result, StagecueError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Where the orchestrator sends outbound events.
///
/// `emit` returns once the event is queued in order behind earlier ones.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: OutboundEvent) -> Result<()>;
}

/// Queues events for a writer task.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<OutboundEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<OutboundEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: OutboundEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| StagecueError::TransportClosed)
    }
}

/// Keeps every emitted event. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct CollectorEventSink {
    events: Arc<Mutex<Vec<OutboundEvent>>>,
}

impl CollectorEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event kinds in emission order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(OutboundEvent::kind).collect()
    }
}

#[async_trait]
impl EventSink for CollectorEventSink {
    async fn emit(&self, event: OutboundEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
