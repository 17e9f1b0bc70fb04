//! Streaming segmentation pipeline for model replies.
//!
//! A small graph of nodes built once per conversation: text deltas enter the
//! sentence boundary node, completed sentences are split into text and tag
//! segments, and segments are handed to sinks. Every unit is fully handled,
//! side effects included, before the next one enters.

pub mod error;
pub mod graph;
pub mod node;
pub mod sentence;
pub mod sink;
pub mod tags;
pub mod types;

pub use error::{ErrorReporter, LogReporter, NodeError};
pub use graph::{PipelineBuilder, SegmentPipeline};
pub use node::{Handle, Node, Stage};
pub use sentence::SentenceBoundaryNode;
pub use sink::{Collector, Consumer, FnConsumer, SinkNode};
pub use tags::{TagExtractionNode, extract_segments};
pub use types::{Segment, SegmentKind, Units};
