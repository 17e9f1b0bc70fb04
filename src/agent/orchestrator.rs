//! Turn taking between the user and the model.
//!
//! At most one generation task runs at a time. New user input cancels it,
//! records whatever was said so far as the assistant's (cut-off) reply, resets
//! the pipeline and starts the next turn with the interruption made explicit
//! to the model.

use crate::agent::dispatch::SegmentDispatcher;
use crate::agent::events::OutboundEvent;
use crate::agent::history::ConversationHistory;
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, StagecueError};
use crate::llm::{ChatMessage, LanguageModel, ModelEvent, Role};
use crate::pipeline::{
    ErrorReporter, FnConsumer, LogReporter, NodeError, SegmentPipeline, SentenceBoundaryNode,
};
use crate::transport::EventSink;
use crate::tts::Synthesizer;
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Settings for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Prefix for user input that cut off a reply.
    pub interrupt_marker: String,
    /// History entries sent to the model per turn.
    pub max_context_length: usize,
    pub boundary_chars: String,
    /// Send each sentence's audio in chunks as it is synthesized.
    pub stream_audio: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interrupt_marker: defaults::INTERRUPT_MARKER.to_string(),
            max_context_length: defaults::MAX_CONTEXT_LENGTH,
            boundary_chars: defaults::BOUNDARY_CHARS.to_string(),
            stream_audio: false,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            interrupt_marker: config.agent.interrupt_marker.clone(),
            max_context_length: config.llm.max_context_length,
            boundary_chars: config.pipeline.boundary_chars.clone(),
            stream_audio: config.tts.stream,
        }
    }
}

/// Where the conversation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Generating,
    /// A generation is being torn down. Always followed by `Idle`.
    Interrupted,
}

/// State shared with the generation task.
struct Shared {
    model: Arc<dyn LanguageModel>,
    events: Arc<dyn EventSink>,
    pipeline: AsyncMutex<SegmentPipeline>,
    history: Mutex<ConversationHistory>,
    state: watch::Sender<TurnState>,
    reporter: LogReporter,
}

impl Shared {
    fn history(&self) -> MutexGuard<'_, ConversationHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TurnState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(?previous, ?state, "Turn state changed");
        }
    }

    /// Records `partial` as the assistant reply unless the turn already
    /// recorded one. Returns true when the synthetic entry was added.
    fn close_turn(&self, partial: &str) -> bool {
        let mut history = self.history();
        if history.last_role() == Some(Role::Assistant) {
            return false;
        }
        tracing::debug!(chars = partial.chars().count(), "Recording cut-off reply");
        history.push_assistant(partial);
        true
    }
}

struct GenerationTask {
    id: u64,
    cancel: CancellationToken,
    partial: Arc<Mutex<String>>,
    handle: JoinHandle<()>,
}

/// Drives model turns for one conversation.
pub struct ResponseOrchestrator {
    shared: Arc<Shared>,
    active: Option<GenerationTask>,
    interrupt_marker: String,
    max_context_length: usize,
    turns: u64,
}

impl ResponseOrchestrator {
    /// Builds the conversation's pipeline once; it is reused for every turn.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        synthesizer: Arc<dyn Synthesizer>,
        events: Arc<dyn EventSink>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        if config.max_context_length == 0 {
            return Err(StagecueError::ConfigInvalidValue {
                key: "llm.max_context_length".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let boundary = SentenceBoundaryNode::new(&config.boundary_chars)?;
        let pipeline = SegmentPipeline::builder(boundary)
            .sentence_tap(FnConsumer::<String, _>::new(|sentence: String| async move {
                tracing::trace!(%sentence, "Sentence complete");
                Ok::<(), NodeError>(())
            }))
            .segment_sink(
                SegmentDispatcher::new(synthesizer, Arc::clone(&events))
                    .with_streaming(config.stream_audio),
            )
            .build()?;

        let (state, _) = watch::channel(TurnState::Idle);
        tracing::debug!(model = model.name(), "Orchestrator ready");

        Ok(Self {
            shared: Arc::new(Shared {
                model,
                events,
                pipeline: AsyncMutex::new(pipeline),
                history: Mutex::new(ConversationHistory::new()),
                state,
                reporter: LogReporter,
            }),
            active: None,
            interrupt_marker: config.interrupt_marker,
            max_context_length: config.max_context_length,
            turns: 0,
        })
    }

    /// Handles one `user_input` event.
    ///
    /// Any input, even blank, cuts off a running generation. Only non-blank
    /// input starts a new one.
    pub async fn on_user_input(&mut self, content: &str) {
        let interrupted = self.interrupt().await;

        if content.trim().is_empty() {
            tracing::debug!("Blank user input, not starting a turn");
            return;
        }

        let entry = if interrupted {
            format!("{}{}", self.interrupt_marker, content)
        } else {
            content.to_string()
        };
        let context = {
            let mut history = self.shared.history();
            history.push_user(entry);
            debug_assert!(history.alternates(), "history roles must alternate");
            history.recent(self.max_context_length)
        };
        self.spawn_turn(context);
    }

    /// Stops the running generation, if any, and waits until it has exited.
    ///
    /// Returns true when a reply was actually cut off. Stopping a task that
    /// already finished only clears it.
    pub async fn interrupt(&mut self) -> bool {
        let Some(task) = self.active.as_mut() else {
            return false;
        };

        if !task.handle.is_finished() {
            tracing::info!(turn = task.id, "Interrupting response");
            self.shared.set_state(TurnState::Interrupted);
        }
        task.cancel.cancel();
        join(task).await;
        let Some(task) = self.active.take() else {
            return false;
        };

        let partial = std::mem::take(&mut *lock(&task.partial));
        let cut_off = self.shared.close_turn(&partial);
        self.shared.pipeline.lock().await.reset();
        self.shared.set_state(TurnState::Idle);
        cut_off
    }

    /// Waits for the running generation to finish on its own.
    ///
    /// A reply that never completes keeps this pending until the caller
    /// drops it.
    pub async fn wait_for_idle(&mut self) {
        if let Some(task) = self.active.as_mut() {
            join(task).await;
            self.active = None;
        }
    }

    pub fn state(&self) -> TurnState {
        *self.shared.state.borrow()
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.shared.history().entries().to_vec()
    }

    /// Text the running generation has produced so far. Empty once the
    /// turn has ended.
    pub fn partial_response(&self) -> String {
        self.active
            .as_ref()
            .filter(|task| !task.handle.is_finished())
            .map(|task| lock(&task.partial).clone())
            .unwrap_or_default()
    }

    /// Text buffered in the pipeline, waiting for a boundary.
    pub async fn pending_text(&self) -> String {
        self.shared.pipeline.lock().await.buffered().to_string()
    }

    fn spawn_turn(&mut self, context: Vec<ChatMessage>) {
        self.turns += 1;
        let id = self.turns;
        let cancel = CancellationToken::new();
        let partial = Arc::new(Mutex::new(String::new()));

        self.shared.set_state(TurnState::Generating);
        let handle = tokio::spawn(run_turn(
            Arc::clone(&self.shared),
            context,
            cancel.clone(),
            Arc::clone(&partial),
            id,
        ));
        self.active = Some(GenerationTask {
            id,
            cancel,
            partial,
            handle,
        });
    }
}

impl Drop for ResponseOrchestrator {
    fn drop(&mut self) {
        if let Some(task) = &self.active {
            task.cancel.cancel();
        }
    }
}

/// Awaits the task's exit. The task stays registered if this is dropped.
async fn join(task: &mut GenerationTask) {
    if let Err(e) = (&mut task.handle).await
        && e.is_panic()
    {
        tracing::error!(turn = task.id, "Generation task panicked: {}", e);
    }
}

fn lock(partial: &Mutex<String>) -> MutexGuard<'_, String> {
    partial.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_turn(
    shared: Arc<Shared>,
    context: Vec<ChatMessage>,
    cancel: CancellationToken,
    partial: Arc<Mutex<String>>,
    id: u64,
) {
    tracing::info!(turn = id, entries = context.len(), "Generating response");

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(turn = id, "Generation cancelled");
            return;
        }
        result = drive_turn(&shared, context, &partial) => result,
    };

    match result {
        Ok(()) => tracing::info!(turn = id, "Response finished"),
        Err(e) => {
            match &e {
                StagecueError::Pipeline(node_error) => shared.reporter.report("pipeline", node_error),
                other => tracing::error!(turn = id, "Generation failed: {}", other),
            }
            let text = lock(&partial).clone();
            shared.close_turn(&text);
            shared.pipeline.lock().await.reset();
        }
    }
    shared.set_state(TurnState::Idle);
}

async fn drive_turn(shared: &Shared, context: Vec<ChatMessage>, partial: &Mutex<String>) -> Result<()> {
    let mut stream = shared.model.respond(context);
    let mut finished = false;

    while let Some(event) = stream.next().await {
        match event {
            ModelEvent::StartOfResponse => {
                lock(partial).clear();
                shared.events.emit(OutboundEvent::StartOfResponse).await?;
            }
            ModelEvent::MessageDelta(delta) => {
                // Cancellation is observed here between deltas
                tokio::task::yield_now().await;
                shared.pipeline.lock().await.push(&delta).await?;
                // Partial text only covers deltas the pipeline has taken
                lock(partial).push_str(&delta);
            }
            ModelEvent::Done(full) => {
                if full != *lock(partial) {
                    tracing::debug!("Final text differs from streamed deltas, keeping deltas");
                }
                finished = true;
                break;
            }
        }
    }
    if !finished {
        tracing::warn!("Model stream ended without a final event");
    }

    let response = lock(partial).clone();
    shared.history().push_assistant(response.clone());
    shared.pipeline.lock().await.flush().await?;
    shared
        .events
        .emit(OutboundEvent::EndOfResponse { response })
        .await
}
