//! A small XML element tree for HTML branches.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Text placement follows the
//! usual XML-tree convention: each element owns the text before its first
//! child (`text`) and the text after its own closing tag (`tail`). Attributes
//! keep insertion order so that serialization is deterministic.

use std::fmt::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// Comment contents are stored in the `text` field.
    Comment,
}

#[derive(Debug)]
struct XmlNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: Option<String>,
    tail: Option<String>,
    kind: NodeKind,
}

/// An arena of XML nodes. Detached nodes simply have no parent; removal
/// never reclaims storage.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<XmlNode>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(XmlNode {
            parent: None,
            children: Vec::new(),
            text: None,
            tail: None,
            kind,
        });
        id
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.into(),
            attrs: Vec::new(),
        })
    }

    /// Creates an element as the last child of `parent`.
    pub fn sub_element(&mut self, parent: NodeId, tag: impl Into<String>) -> NodeId {
        let id = self.create_element(tag);
        self.append(parent, id);
        id
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        let id = self.push(NodeKind::Comment);
        self.nodes[id.0].text = Some(text.into());
        id
    }

    /// Moves `child` to be the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Moves `node` to sit immediately before `reference` under the same
    /// parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        let parent = self.nodes[reference.0]
            .parent
            .expect("insert_before requires an attached reference node");
        self.detach(node);
        let index = self.child_index(parent, reference);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, node);
    }

    /// Detaches `node` from its parent, if any.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            let index = self.child_index(parent, node);
            self.nodes[parent.0].children.remove(index);
        }
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == child)
            .expect("child is always present in its parent's list")
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let index = self.child_index(parent, node);
        if index > 0 {
            Some(self.nodes[parent.0].children[index - 1])
        } else {
            None
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.nodes[node.0].children.len()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.last().copied()
    }

    /// The element's tag; empty for comments.
    pub fn tag(&self, node: NodeId) -> &str {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => tag,
            NodeKind::Comment => "",
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element { .. })
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].text.as_deref()
    }

    pub fn set_text(&mut self, node: NodeId, text: Option<String>) {
        self.nodes[node.0].text = text;
    }

    pub fn append_to_text(&mut self, node: NodeId, text: &str) {
        match &mut self.nodes[node.0].text {
            Some(existing) => existing.push_str(text),
            slot => *slot = Some(text.to_string()),
        }
    }

    pub fn tail(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].tail.as_deref()
    }

    pub fn set_tail(&mut self, node: NodeId, tail: Option<String>) {
        self.nodes[node.0].tail = tail;
    }

    pub fn append_to_tail(&mut self, node: NodeId, text: &str) {
        match &mut self.nodes[node.0].tail {
            Some(existing) => existing.push_str(text),
            slot => *slot = Some(text.to_string()),
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            for attr in attrs.iter_mut() {
                if attr.0 == name {
                    attr.1 = value.to_string();
                    return;
                }
            }
            attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get_attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|attr| attr.0 == name)
                .map(|attr| attr.1.as_str()),
            NodeKind::Comment => None,
        }
    }

    /// Removes and returns the attribute value, if present.
    pub fn take_attr(&mut self, node: NodeId, name: &str) -> Option<String> {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            if let Some(index) = attrs.iter().position(|attr| attr.0 == name) {
                return Some(attrs.remove(index).1);
            }
        }
        None
    }

    pub fn has_attrs(&self, node: NodeId) -> bool {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => !attrs.is_empty(),
            NodeKind::Comment => false,
        }
    }

    /// Serializes the subtree rooted at `node`. An element with no text and
    /// no children collapses to `<tag/>`.
    pub fn serialize(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.0];
        match &data.kind {
            NodeKind::Comment => {
                out.push_str("<!--");
                if let Some(text) = &data.text {
                    out.push_str(text);
                }
                out.push_str("-->");
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
                }
                if data.text.is_none() && data.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    if let Some(text) = &data.text {
                        out.push_str(&escape_text(text));
                    }
                    for child in &data.children {
                        self.serialize(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
        if let Some(tail) = &data.tail {
            out.push_str(&escape_text(tail));
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(doc: &Document, node: NodeId) -> String {
        let mut out = String::new();
        doc.serialize(node, &mut out);
        out
    }

    #[test]
    fn text_and_tail_placement() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_text(p, Some("one ".into()));
        let b = doc.sub_element(p, "b");
        doc.set_text(b, Some("two".into()));
        doc.set_tail(b, Some(" three".into()));
        assert_eq!(serialize(&doc, p), "<p>one <b>two</b> three</p>");
    }

    #[test]
    fn empty_elements_self_close() {
        let mut doc = Document::new();
        let br = doc.create_element("br");
        assert_eq!(serialize(&doc, br), "<br/>");
        let p = doc.create_element("p");
        doc.set_text(p, Some(String::new()));
        assert_eq!(serialize(&doc, p), "<p></p>");
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let mut doc = Document::new();
        let meta = doc.create_element("meta");
        doc.set_attr(meta, "http-equiv", "Content-Type");
        doc.set_attr(meta, "content", "a \"b\"");
        assert_eq!(
            serialize(&doc, meta),
            "<meta http-equiv=\"Content-Type\" content=\"a &quot;b&quot;\"/>"
        );
        doc.set_attr(meta, "http-equiv", "refresh");
        assert!(serialize(&doc, meta).starts_with("<meta http-equiv=\"refresh\""));
    }

    #[test]
    fn escaping() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_text(p, Some("a < b & c > d".into()));
        assert_eq!(serialize(&doc, p), "<p>a &lt; b &amp; c &gt; d</p>");
    }

    #[test]
    fn comments_are_not_escaped() {
        let mut doc = Document::new();
        let style = doc.create_element("style");
        let comment = doc.create_comment("\na < b\n");
        doc.append(style, comment);
        assert_eq!(serialize(&doc, style), "<style><!--\na < b\n--></style>");
    }

    #[test]
    fn append_moves_between_parents() {
        let mut doc = Document::new();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let child = doc.sub_element(a, "c");
        doc.append(b, child);
        assert_eq!(doc.child_count(a), 0);
        assert_eq!(doc.parent(child), Some(b));
    }

    #[test]
    fn insert_before_and_siblings() {
        let mut doc = Document::new();
        let root = doc.create_element("root");
        let second = doc.sub_element(root, "second");
        let first = doc.create_element("first");
        doc.insert_before(second, first);
        assert_eq!(doc.children(root), vec![first, second]);
        assert_eq!(doc.prev_sibling(second), Some(first));
        assert_eq!(doc.prev_sibling(first), None);
    }

    #[test]
    fn detach_removes_from_parent() {
        let mut doc = Document::new();
        let root = doc.create_element("root");
        let child = doc.sub_element(root, "child");
        doc.detach(child);
        assert_eq!(doc.child_count(root), 0);
        assert_eq!(doc.parent(child), None);
    }
}
