//! Core node abstraction and the stage that wires nodes into a graph.
//!
//! A [`Stage`] owns one node plus the ordered list of downstream targets it
//! fans out to. Targets are registered while the graph is built and cannot be
//! changed afterwards: `connect` consumes the stage and returns it.

use crate::pipeline::error::NodeError;
use crate::pipeline::types::Units;
use async_trait::async_trait;

/// A transform in the segmentation pipeline.
///
/// Receives one input unit and produces zero, one or many output units.
#[async_trait]
pub trait Node: Send + 'static {
    /// The input type this node receives.
    type Input: Send + 'static;
    /// The output type this node produces. Cloned once per downstream target.
    type Output: Clone + Send + 'static;

    /// Processes a single input unit.
    ///
    /// Returns:
    /// - `Ok(Some(units))` - output to propagate downstream
    /// - `Ok(None)` or an empty batch - nothing to propagate, the chain stops here
    /// - `Err(NodeError)` - processing failed
    async fn process(
        &mut self,
        input: Self::Input,
    ) -> Result<Option<Units<Self::Output>>, NodeError>;

    /// Returns the name of this node for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Drops any buffered state. Stateless nodes keep the default.
    fn reset(&mut self) {}
}

/// Anything a stage can fan out to.
///
/// Object safe so stages of different node types can share one target list.
#[async_trait]
pub trait Handle<T: Send + 'static>: Send {
    /// Entry point: handles a single unit or an ordered batch.
    async fn handle(&mut self, input: Units<T>) -> Result<(), NodeError>;

    /// Resets this target and everything downstream of it.
    fn reset(&mut self);
}

/// A node together with its downstream fan-out targets.
pub struct Stage<N: Node> {
    node: N,
    targets: Vec<Box<dyn Handle<N::Output>>>,
}

impl<N: Node> Stage<N> {
    /// Wraps a node with no downstream targets.
    pub fn new(node: N) -> Self {
        Self {
            node,
            targets: Vec::new(),
        }
    }

    /// Registers `next` as a fan-out target.
    ///
    /// Registration order is the order outputs are propagated in.
    pub fn connect(self, next: impl Handle<N::Output> + 'static) -> Self {
        self.connect_boxed(Box::new(next))
    }

    /// Registers an already boxed fan-out target.
    pub fn connect_boxed(mut self, next: Box<dyn Handle<N::Output>>) -> Self {
        self.targets.push(next);
        self
    }

    /// Borrows the wrapped node.
    pub fn node(&self) -> &N {
        &self.node
    }

    /// Number of downstream targets.
    pub fn fan_out(&self) -> usize {
        self.targets.len()
    }

    async fn handle_one(&mut self, input: N::Input) -> Result<(), NodeError> {
        let output = match self.node.process(input).await? {
            Some(output) if !output.is_empty() => output,
            _ => return Ok(()),
        };

        // Sequential fan-out: each target completes before the next starts
        for target in &mut self.targets {
            target.handle(output.clone()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<N: Node> Handle<N::Input> for Stage<N> {
    async fn handle(&mut self, input: Units<N::Input>) -> Result<(), NodeError> {
        for item in input.into_vec() {
            self.handle_one(item).await?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.node.reset();
        for target in &mut self.targets {
            target.reset();
        }
    }
}
