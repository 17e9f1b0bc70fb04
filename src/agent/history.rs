//! Ordered conversation history.

use crate::llm::{ChatMessage, Role};

/// Append-only list of `{role, content}` entries.
///
/// The orchestrator keeps user and assistant entries alternating: a user
/// entry is only added after an assistant entry (or at the start).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    entries: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    /// Role of the newest entry.
    pub fn last_role(&self) -> Option<Role> {
        self.entries.last().map(|m| m.role)
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ChatMessage> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no two neighbouring entries share a role.
    pub fn alternates(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].role != w[1].role)
    }
}
