//! Scripted model for tests and demos.
//!
//! Each call to `respond` plays the next queued [`ScriptedTurn`] and records
//! the context it was given.

use crate::llm::{ChatMessage, LanguageModel, ModelEvent, ModelStream};
use futures_util::StreamExt;
use futures_util::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// One canned reply.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    pub deltas: Vec<String>,
    /// Never finish after the deltas. Models a reply still being generated.
    pub hold: bool,
}

impl ScriptedTurn {
    pub fn reply<S: Into<String>>(deltas: impl IntoIterator<Item = S>) -> Self {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            hold: false,
        }
    }

    pub fn held<S: Into<String>>(deltas: impl IntoIterator<Item = S>) -> Self {
        Self {
            hold: true,
            ..Self::reply(deltas)
        }
    }
}

/// Plays queued turns in order. An exhausted script answers with an empty turn.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    contexts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedModel {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into_iter().collect())),
            contexts: Arc::default(),
        }
    }

    /// Contexts received so far, one per call.
    pub fn contexts(&self) -> Vec<Vec<ChatMessage>> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn respond(&self, context: Vec<ChatMessage>) -> ModelStream {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context);
        let turn = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_default();

        let mut events = vec![ModelEvent::StartOfResponse];
        events.extend(turn.deltas.iter().cloned().map(ModelEvent::MessageDelta));
        if turn.hold {
            stream::iter(events).chain(stream::pending()).boxed()
        } else {
            events.push(ModelEvent::Done(turn.deltas.concat()));
            stream::iter(events).boxed()
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
