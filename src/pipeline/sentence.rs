//! Sentence boundary node: turns a stream of text deltas into speakable units.

use crate::defaults;
use crate::pipeline::error::NodeError;
use crate::pipeline::node::Node;
use crate::pipeline::types::Units;
use async_trait::async_trait;

/// Accumulates text fragments and emits completed sentence-like units.
///
/// The buffer always holds exactly the unterminated suffix of everything seen
/// since construction, the last [`reset`](Node::reset) or the last flush.
#[derive(Debug, Clone)]
pub struct SentenceBoundaryNode {
    boundaries: Vec<char>,
    buffer: String,
}

impl SentenceBoundaryNode {
    /// Creates a node splitting on any run of the given characters.
    ///
    /// An empty boundary set is a construction bug and is rejected.
    pub fn new(boundary_chars: &str) -> Result<Self, NodeError> {
        let mut boundaries: Vec<char> = Vec::new();
        for c in boundary_chars.chars() {
            if !boundaries.contains(&c) {
                boundaries.push(c);
            }
        }
        if boundaries.is_empty() {
            return Err(NodeError::Fatal(
                "sentence boundary set must contain at least one character".to_string(),
            ));
        }
        Ok(Self {
            boundaries,
            buffer: String::new(),
        })
    }

    /// Unit that forces the current buffer out as a completed sentence.
    pub fn flush_unit(&self) -> String {
        // new() guarantees at least one boundary
        self.boundaries
            .first()
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    pub fn is_boundary(&self, c: char) -> bool {
        self.boundaries.contains(&c)
    }

    /// The unterminated text waiting for its boundary.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Appends `delta` and returns every unit completed by it, in order.
    pub fn split(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut fragments = Vec::new();
        let mut current = String::new();
        let mut in_boundary_run = false;
        for c in self.buffer.chars() {
            if self.is_boundary(c) {
                if !in_boundary_run {
                    fragments.push(std::mem::take(&mut current));
                    in_boundary_run = true;
                }
            } else {
                in_boundary_run = false;
                current.push(c);
            }
        }

        // The last fragment is not terminated yet
        self.buffer = current;
        fragments
    }
}

impl Default for SentenceBoundaryNode {
    fn default() -> Self {
        Self {
            boundaries: defaults::BOUNDARY_CHARS.chars().collect(),
            buffer: String::new(),
        }
    }
}

#[async_trait]
impl Node for SentenceBoundaryNode {
    type Input = String;
    type Output = String;

    async fn process(&mut self, delta: String) -> Result<Option<Units<String>>, NodeError> {
        Ok(Some(Units::Batch(self.split(&delta))))
    }

    fn name(&self) -> &'static str {
        "sentence_boundary"
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}
