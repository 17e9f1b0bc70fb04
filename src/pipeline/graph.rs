//! The segmentation pipeline: sentence boundary → tag extraction → sinks.

use crate::pipeline::error::NodeError;
use crate::pipeline::node::{Handle, Stage};
use crate::pipeline::sentence::SentenceBoundaryNode;
use crate::pipeline::sink::{Consumer, SinkNode};
use crate::pipeline::tags::TagExtractionNode;
use crate::pipeline::types::{Segment, Units};

/// Builds a [`SegmentPipeline`].
///
/// Consumers attached to the same edge are called in the order they were
/// added. Sentence taps run before the tag stage sees the sentence.
pub struct PipelineBuilder {
    boundary: SentenceBoundaryNode,
    sentence_taps: Vec<Box<dyn Handle<String>>>,
    segment_sinks: Vec<Box<dyn Handle<Segment>>>,
}

impl PipelineBuilder {
    pub fn new(boundary: SentenceBoundaryNode) -> Self {
        Self {
            boundary,
            sentence_taps: Vec::new(),
            segment_sinks: Vec::new(),
        }
    }

    /// Observes every completed sentence (debugging, transcripts).
    pub fn sentence_tap<C>(mut self, consumer: C) -> Self
    where
        C: Consumer<Item = String>,
    {
        self.sentence_taps
            .push(Box::new(Stage::new(SinkNode::new(consumer))));
        self
    }

    /// Adds a consumer for text/tag segments.
    pub fn segment_sink<C>(mut self, consumer: C) -> Self
    where
        C: Consumer<Item = Segment>,
    {
        self.segment_sinks
            .push(Box::new(Stage::new(SinkNode::new(consumer))));
        self
    }

    /// Wires the graph. Fails when no segment sink was added.
    pub fn build(self) -> Result<SegmentPipeline, NodeError> {
        if self.segment_sinks.is_empty() {
            return Err(NodeError::Fatal(
                "pipeline needs at least one segment sink".to_string(),
            ));
        }

        let mut tags = Stage::new(TagExtractionNode::new());
        for sink in self.segment_sinks {
            tags = tags.connect_boxed(sink);
        }

        let mut head = Stage::new(self.boundary);
        for tap in self.sentence_taps {
            head = head.connect_boxed(tap);
        }
        head = head.connect(tags);

        Ok(SegmentPipeline { head })
    }
}

/// One conversation's segmentation graph.
///
/// Edges are fixed once built. The only mutable state is the sentence buffer.
pub struct SegmentPipeline {
    head: Stage<SentenceBoundaryNode>,
}

impl SegmentPipeline {
    pub fn builder(boundary: SentenceBoundaryNode) -> PipelineBuilder {
        PipelineBuilder::new(boundary)
    }

    /// Pushes one model delta through the whole graph.
    ///
    /// Returns once every segment produced by it has been consumed.
    pub async fn push(&mut self, delta: &str) -> Result<(), NodeError> {
        self.head.handle(Units::One(delta.to_string())).await
    }

    /// Pushes several deltas, each completed before the next.
    pub async fn push_all(&mut self, deltas: Vec<String>) -> Result<(), NodeError> {
        self.head.handle(Units::Batch(deltas)).await
    }

    /// Forces any unterminated text out as a final sentence.
    pub async fn flush(&mut self) -> Result<(), NodeError> {
        let unit = self.head.node().flush_unit();
        self.head.handle(Units::One(unit)).await
    }

    /// Drops buffered text. Called whenever a generation is abandoned.
    pub fn reset(&mut self) {
        self.head.reset();
    }

    /// Text received but not yet terminated by a boundary.
    pub fn buffered(&self) -> &str {
        self.head.node().buffered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sink::{Collector, FnConsumer};

    fn boundary() -> SentenceBoundaryNode {
        SentenceBoundaryNode::new(",.:;? ，。：；？").unwrap()
    }

    #[test]
    fn test_build_without_sink_fails() {
        let result = SegmentPipeline::builder(boundary()).build();
        assert!(matches!(result, Err(NodeError::Fatal(_))));
    }

    #[tokio::test]
    async fn test_deltas_become_ordered_segments() {
        let segments = Collector::new();
        let mut pipeline = SegmentPipeline::builder(boundary())
            .segment_sink(segments.clone())
            .build()
            .unwrap();

        pipeline.push("你").await.unwrap();
        pipeline.push("好[点头]").await.unwrap();
        assert!(segments.items().is_empty());
        assert_eq!(pipeline.buffered(), "你好[点头]");

        pipeline.flush().await.unwrap();
        assert_eq!(
            segments.items(),
            vec![Segment::text("你好"), Segment::tag("点头")]
        );
        assert_eq!(pipeline.buffered(), "");
    }

    #[tokio::test]
    async fn test_sample_conversation() {
        let segments = Collector::new();
        let sentences = Collector::new();
        let mut pipeline = SegmentPipeline::builder(boundary())
            .sentence_tap(sentences.clone())
            .segment_sink(segments.clone())
            .build()
            .unwrap();

        pipeline
            .push_all(vec![
                "你好，我是树莓娘[点头]你好,woshi".to_string(),
                "树莓娘[wink]？？？我是谁呀".to_string(),
                "我是树莓[摇头]娘".to_string(),
            ])
            .await
            .unwrap();
        pipeline.flush().await.unwrap();

        assert_eq!(
            sentences.items(),
            vec![
                "你好",
                "我是树莓娘[点头]你好",
                "woshi树莓娘[wink]",
                "我是谁呀我是树莓[摇头]娘",
            ]
        );
        assert_eq!(
            segments.items(),
            vec![
                Segment::text("你好"),
                Segment::text("我是树莓娘"),
                Segment::tag("点头"),
                Segment::text("你好"),
                Segment::text("woshi树莓娘"),
                Segment::tag("wink"),
                Segment::text("我是谁呀我是树莓"),
                Segment::tag("摇头"),
                Segment::text("娘"),
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_discards_abandoned_text() {
        let segments = Collector::new();
        let mut pipeline = SegmentPipeline::builder(boundary())
            .segment_sink(segments.clone())
            .build()
            .unwrap();

        pipeline.push("部分回复").await.unwrap();
        pipeline.reset();
        pipeline.push("新的").await.unwrap();
        pipeline.flush().await.unwrap();

        assert_eq!(segments.items(), vec![Segment::text("新的")]);
    }

    #[tokio::test]
    async fn test_multiple_segment_sinks_receive_in_order() {
        let log = Collector::new();
        let first = {
            let log = log.clone();
            FnConsumer::<Segment, _>::new(move |s: Segment| {
                let log = log.clone();
                async move {
                    log.push(format!("a:{}", s.content));
                    Ok::<(), NodeError>(())
                }
            })
        };
        let second = {
            let log = log.clone();
            FnConsumer::<Segment, _>::new(move |s: Segment| {
                let log = log.clone();
                async move {
                    log.push(format!("b:{}", s.content));
                    Ok::<(), NodeError>(())
                }
            })
        };
        let mut pipeline = SegmentPipeline::builder(boundary())
            .segment_sink(first)
            .segment_sink(second)
            .build()
            .unwrap();

        pipeline.push("x[y]。").await.unwrap();

        assert_eq!(log.items(), vec!["a:x", "a:y", "b:x", "b:y"]);
    }
}
