//! Tag extraction node: splits a sentence into speakable text and bracket tags.

use crate::pipeline::error::NodeError;
use crate::pipeline::node::Node;
use crate::pipeline::types::{Segment, Units};
use async_trait::async_trait;

/// Stateless node that separates `[marker]` stage directions from text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagExtractionNode;

impl TagExtractionNode {
    pub fn new() -> Self {
        Self
    }
}

/// Splits `text` into ordered text/tag segments.
///
/// A tag is the shortest `[...]` span starting at an opening bracket; it never
/// crosses a line break. Empty text slices are dropped, empty tags are kept.
/// An opening bracket without a closing one on the same line is plain text.
pub fn extract_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find('[').map(|i| cursor + i) {
        let inner_start = open + 1;
        let close = text[inner_start..]
            .find([']', '\n'])
            .map(|i| inner_start + i)
            .filter(|&i| text[i..].starts_with(']'));

        let Some(close) = close else {
            cursor = inner_start;
            continue;
        };

        if open > text_start {
            segments.push(Segment::text(&text[text_start..open]));
        }
        segments.push(Segment::tag(&text[inner_start..close]));
        text_start = close + 1;
        cursor = text_start;
    }

    if text_start < text.len() {
        segments.push(Segment::text(&text[text_start..]));
    }
    segments
}

#[async_trait]
impl Node for TagExtractionNode {
    type Input = String;
    type Output = Segment;

    async fn process(&mut self, text: String) -> Result<Option<Units<Segment>>, NodeError> {
        Ok(Some(Units::Batch(extract_segments(&text))))
    }

    fn name(&self) -> &'static str {
        "tag_extraction"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_tag_text() {
        assert_eq!(
            extract_segments("你好[点头]世界"),
            vec![
                Segment::text("你好"),
                Segment::tag("点头"),
                Segment::text("世界")
            ]
        );
    }

    #[test]
    fn test_lone_tag_has_no_empty_text() {
        assert_eq!(extract_segments("[wink]"), vec![Segment::tag("wink")]);
    }

    #[test]
    fn test_no_brackets_is_single_text() {
        assert_eq!(
            extract_segments("just words"),
            vec![Segment::text("just words")]
        );
        assert!(extract_segments("").is_empty());
    }

    #[test]
    fn test_adjacent_tags() {
        assert_eq!(
            extract_segments("[smile][wave]hi"),
            vec![
                Segment::tag("smile"),
                Segment::tag("wave"),
                Segment::text("hi")
            ]
        );
    }

    #[test]
    fn test_non_greedy_match() {
        assert_eq!(
            extract_segments("a[b]c[d]"),
            vec![
                Segment::text("a"),
                Segment::tag("b"),
                Segment::text("c"),
                Segment::tag("d")
            ]
        );
    }

    #[test]
    fn test_empty_tag_is_kept() {
        assert_eq!(
            extract_segments("x[]y"),
            vec![Segment::text("x"), Segment::tag(""), Segment::text("y")]
        );
    }

    #[test]
    fn test_unclosed_bracket_is_text() {
        assert_eq!(extract_segments("oops [no close"), vec![Segment::text("oops [no close")]);
    }

    #[test]
    fn test_nested_opening_bracket_belongs_to_tag() {
        assert_eq!(
            extract_segments("[[a]b"),
            vec![Segment::tag("[a"), Segment::text("b")]
        );
    }

    #[test]
    fn test_tag_does_not_cross_line_break() {
        assert_eq!(
            extract_segments("[a\nb[c]"),
            vec![Segment::text("[a\nb"), Segment::tag("c")]
        );
    }

    #[tokio::test]
    async fn test_node_emits_batch() {
        let mut node = TagExtractionNode::new();
        let output = node.process("嗯[思考]".to_string()).await.unwrap();
        assert_eq!(
            output,
            Some(Units::Batch(vec![Segment::text("嗯"), Segment::tag("思考")]))
        );

        let output = node.process(String::new()).await.unwrap();
        assert_eq!(output, Some(Units::Batch(vec![])));
    }
}
