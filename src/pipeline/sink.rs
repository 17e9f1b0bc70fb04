//! Terminal nodes that hand units to side-effecting consumers.

use crate::pipeline::error::{ErrorReporter, LogReporter, NodeError};
use crate::pipeline::node::Node;
use crate::pipeline::types::Units;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

/// Pluggable handler at the end of a pipeline branch.
#[async_trait]
pub trait Consumer: Send + 'static {
    /// The unit type this consumer accepts.
    type Item: Clone + Send + 'static;

    /// Handles one unit. Called for each unit reaching the sink, in order.
    async fn consume(&mut self, item: Self::Item) -> Result<(), NodeError>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Node wrapper for any [`Consumer`].
///
/// Produces no output, so nothing connected after it ever receives a unit.
/// A recoverable consumer error is reported and the unit dropped; fatal
/// errors propagate.
pub struct SinkNode<C: Consumer> {
    consumer: C,
}

impl<C: Consumer> SinkNode<C> {
    pub fn new(consumer: C) -> Self {
        Self { consumer }
    }

    /// Borrows the wrapped consumer.
    pub fn consumer(&self) -> &C {
        &self.consumer
    }
}

impl<T, F, Fut> SinkNode<FnConsumer<T, F>>
where
    T: Clone + Send + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
{
    /// Builds a sink from an async closure.
    pub fn from_fn(f: F) -> Self {
        Self::new(FnConsumer::new(f))
    }
}

#[async_trait]
impl<C: Consumer> Node for SinkNode<C> {
    type Input = C::Item;
    type Output = ();

    async fn process(&mut self, input: C::Item) -> Result<Option<Units<()>>, NodeError> {
        match self.consumer.consume(input).await {
            Err(e) if !e.is_fatal() => LogReporter.report(self.consumer.name(), &e),
            result => result?,
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        self.consumer.name()
    }
}

/// Consumer backed by an async closure.
pub struct FnConsumer<T, F> {
    f: F,
    _item: PhantomData<fn(T)>,
}

impl<T, F> FnConsumer<T, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _item: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> Consumer for FnConsumer<T, F>
where
    T: Clone + Send + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
{
    type Item = T;

    async fn consume(&mut self, item: T) -> Result<(), NodeError> {
        (self.f)(item).await
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}

/// Consumer that keeps every unit it receives.
///
/// Clones share the same storage, so a test or a debug tap can keep one
/// handle while the pipeline owns another.
#[derive(Debug)]
pub struct Collector<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Collector<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Collector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit directly.
    pub fn push(&self, item: T) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Snapshot of everything collected so far.
    pub fn items(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything collected so far.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> Consumer for Collector<T> {
    type Item = T;

    async fn consume(&mut self, item: T) -> Result<(), NodeError> {
        self.push(item);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Segment;

    #[tokio::test]
    async fn test_sink_returns_nothing() {
        let collector = Collector::new();
        let mut sink = SinkNode::new(collector.clone());

        let output = sink.process(Segment::text("hi")).await.unwrap();

        assert!(output.is_none());
        assert_eq!(collector.items(), vec![Segment::text("hi")]);
    }

    #[tokio::test]
    async fn test_collector_clones_share_storage() {
        let a = Collector::new();
        let mut b = a.clone();
        b.consume(1).await.unwrap();
        a.push(2);

        assert_eq!(a.items(), vec![1, 2]);
        assert_eq!(b.take(), vec![1, 2]);
        assert!(a.items().is_empty());
    }

    #[tokio::test]
    async fn test_fn_consumer_fatal_errors_propagate() {
        let mut sink = SinkNode::from_fn(|n: i32| async move {
            if n < 0 {
                Err(NodeError::Fatal(format!("negative: {}", n)))
            } else {
                Ok(())
            }
        });

        assert!(sink.process(1).await.is_ok());
        assert_eq!(
            sink.process(-1).await,
            Err(NodeError::Fatal("negative: -1".to_string()))
        );
        assert_eq!(sink.name(), "fn");
    }

    #[tokio::test]
    async fn test_recoverable_error_drops_only_that_unit() {
        let kept = Collector::new();
        let mut sink = {
            let kept = kept.clone();
            SinkNode::from_fn(move |n: i32| {
                let kept = kept.clone();
                async move {
                    if n < 0 {
                        return Err(NodeError::Recoverable(format!("negative: {}", n)));
                    }
                    kept.push(n);
                    Ok(())
                }
            })
        };

        for n in [1, -1, 2] {
            assert_eq!(sink.process(n).await, Ok(None));
        }

        assert_eq!(kept.items(), vec![1, 2]);
    }

    #[test]
    fn test_sink_name_comes_from_consumer() {
        let sink = SinkNode::new(Collector::<String>::new());
        assert_eq!(sink.name(), "collector");
    }
}
