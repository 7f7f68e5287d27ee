use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One opaque message segment. The engine never interprets segment
/// contents; it only carries them between the application and the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: String,
    pub data: BTreeMap<String, String>,
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert("text".to_string(), text.into());
        Self {
            kind: "text".to_string(),
            data,
        }
    }
}

/// The body of an outgoing or incoming chat message: an ordered list of
/// opaque segments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageContent {
    pub segments: Vec<Segment>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::text(text)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Concatenation of the plain-text segments, used for log lines.
    pub fn raw_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.kind == "text")
            .filter_map(|s| s.data.get("text").cloned())
            .collect()
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::text(text)
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_skips_non_text_segments() {
        let mut content = MessageContent::text("hello ");
        content.segments.push(Segment {
            kind: "image".into(),
            data: BTreeMap::new(),
        });
        content.segments.push(Segment::text("world"));
        assert_eq!(content.raw_text(), "hello world");
    }
}
