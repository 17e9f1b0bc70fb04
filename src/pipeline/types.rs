//! Data types flowing through the segmentation pipeline.

use serde::{Deserialize, Serialize};

/// Kind of a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Speakable text.
    Text,
    /// Inline stage direction, e.g. an expression cue.
    Tag,
}

/// A text-or-tag unit produced by tag extraction.
///
/// Tag segments carry the inner text of the bracket only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
}

impl Segment {
    /// Creates a text segment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Text,
            content: content.into(),
        }
    }

    /// Creates a tag segment.
    pub fn tag(content: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Tag,
            content: content.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == SegmentKind::Text
    }

    pub fn is_tag(&self) -> bool {
        self.kind == SegmentKind::Tag
    }
}

/// One unit or an ordered batch of units travelling along a pipeline edge.
///
/// A batch is handled element by element, each fully completed before the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Units<T> {
    One(T),
    Batch(Vec<T>),
}

impl<T> Units<T> {
    /// Returns true when there is nothing to propagate.
    pub fn is_empty(&self) -> bool {
        match self {
            Units::One(_) => false,
            Units::Batch(items) => items.is_empty(),
        }
    }

    /// Number of units carried.
    pub fn len(&self) -> usize {
        match self {
            Units::One(_) => 1,
            Units::Batch(items) => items.len(),
        }
    }

    /// Flattens into an ordered vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Units::One(item) => vec![item],
            Units::Batch(items) => items,
        }
    }
}

impl<T> From<T> for Units<T> {
    fn from(item: T) -> Self {
        Units::One(item)
    }
}

impl<T> From<Vec<T>> for Units<T> {
    fn from(items: Vec<T>) -> Self {
        Units::Batch(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_constructors() {
        let text = Segment::text("你好");
        assert!(text.is_text());
        assert_eq!(text.content, "你好");

        let tag = Segment::tag("点头");
        assert!(tag.is_tag());
        assert_eq!(tag.content, "点头");
    }

    #[test]
    fn test_segment_serializes_snake_case_kind() {
        let json = serde_json::to_string(&Segment::tag("wink")).unwrap();
        assert_eq!(json, r#"{"kind":"tag","content":"wink"}"#);
    }

    #[test]
    fn test_units_empty_and_len() {
        assert!(Units::<String>::Batch(vec![]).is_empty());
        assert!(!Units::One("a".to_string()).is_empty());
        assert_eq!(Units::Batch(vec![1, 2, 3]).len(), 3);
        assert_eq!(Units::One(7).len(), 1);
    }

    #[test]
    fn test_units_into_vec_preserves_order() {
        assert_eq!(Units::Batch(vec![3, 1, 2]).into_vec(), vec![3, 1, 2]);
        assert_eq!(Units::One(5).into_vec(), vec![5]);
    }
}
