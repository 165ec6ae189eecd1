//! Nodes of a parsed source document.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Name of a source file, as shared by all locations in that file.
///
/// The display path is whatever the file was opened as; it is only used in
/// diagnostics. The directory path is the base for resolving relative
/// includes.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceName {
    pub display_path: String,
    pub dir_path: PathBuf,
}

impl SourceName {
    pub fn new(display_path: impl Into<String>, dir_path: impl Into<PathBuf>) -> Rc<SourceName> {
        Rc::new(SourceName {
            display_path: display_path.into(),
            dir_path: dir_path.into(),
        })
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_path)
    }
}

/// Position of a node in a source file. Lines are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub source: Rc<SourceName>,
    pub line: u32,
}

impl Location {
    pub fn new(source: &Rc<SourceName>, line: u32) -> Location {
        Location {
            source: Rc::clone(source),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// A sequence of sibling nodes: the body of a document, or one macro argument.
pub type NodeList = Vec<Node>;

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Text(TextNode),
    Call(CallNode),
}

impl Node {
    pub fn location(&self) -> &Location {
        match self {
            Node::Text(text) => &text.location,
            Node::Call(call) => &call.location,
        }
    }
}

/// A run of plain text.
#[derive(Clone, Debug, PartialEq)]
pub struct TextNode {
    pub location: Location,
    pub text: String,
}

impl TextNode {
    pub fn new(location: Location, text: impl Into<String>) -> TextNode {
        TextNode {
            location,
            text: text.into(),
        }
    }
}

/// A macro call with zero or more argument groups.
#[derive(Clone, Debug, PartialEq)]
pub struct CallNode {
    pub location: Location,
    pub name: String,
    pub args: Vec<NodeList>,
}

impl CallNode {
    pub fn new(location: Location, name: impl Into<String>) -> CallNode {
        CallNode {
            location,
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let source = SourceName::new("dir/book.psc", "dir");
        let location = Location::new(&source, 42);
        assert_eq!(location.to_string(), "dir/book.psc:42");
    }
}
