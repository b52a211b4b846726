//! Dissection output: a tree of labeled byte ranges plus the packet summary columns.

use crate::value::Value;

/// `len` bytes starting at `start` in the dissected buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub start: usize,
    pub len: usize,
}

impl ByteRange {
    pub fn new(start: usize, len: usize) -> Self {
        ByteRange { start, len }
    }

    pub fn span(start: usize, end: usize) -> Self {
        ByteRange {
            start,
            len: end.saturating_sub(start),
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// One node of the dissection tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    /// Descriptor (or flag descriptor) name; `None` for plain text subtrees.
    pub field: Option<String>,
    pub text: String,
    pub range: ByteRange,
    pub value: Option<Value>,
    /// Value was (partly) read from zero padding past the available bytes.
    pub padded: bool,
    /// Malformed-data annotation.
    pub expert: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(text: impl Into<String>, range: ByteRange) -> Node {
        Node {
            text: text.into(),
            range,
            ..Node::default()
        }
    }

    pub fn item(field: &str, text: String, range: ByteRange, value: Value) -> Node {
        Node {
            field: Some(field.to_string()),
            text,
            range,
            value: Some(value),
            ..Node::default()
        }
    }

    /// Append a child and return it for further nesting.
    pub fn add(&mut self, child: Node) -> &mut Node {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// First node (depth first, self included) carrying descriptor `field`.
    pub fn find(&self, field: &str) -> Option<&Node> {
        if self.field.as_deref() == Some(field) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(field))
    }

    /// All nodes (depth first) carrying descriptor `field`.
    pub fn find_all<'a>(&'a self, field: &str, out: &mut Vec<&'a Node>) {
        if self.field.as_deref() == Some(field) {
            out.push(self);
        }
        for c in &self.children {
            c.find_all(field, out);
        }
    }

    /// Child subtree whose text starts with `prefix`.
    pub fn subtree(&self, prefix: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.text.starts_with(prefix))
    }
}

/// Free-text info column. The first message of a buffer replaces its contents,
/// later ones append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoColumn {
    text: String,
}

impl InfoColumn {
    pub fn set(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Packet summary columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    pub protocol: String,
    /// `System: <sysid>, Component: <compid>` of the last decoded header.
    pub source: String,
    /// Message name of the last decoded header.
    pub destination: String,
    pub info: InfoColumn,
}
