//! The HTML branch: builds an XHTML document tree as macros execute.
//!
//! Text does not go straight into the tree. The branch keeps a small amount
//! of line state (a text accumulator, the tail of the current line, a
//! pending separator) so that typography macros can request non-breaking
//! spaces or inspect the last character without touching the tree. Blank
//! lines in the input open and close paragraph elements automatically.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::branch::{Branch, BranchId};
use crate::context::{ExecutionContext, MacroBinding, MacroMap};
use crate::error::{ExecError, InternalError};
use crate::executor::Executor;
use crate::typography::{self, Typography};
use crate::xml::{Document, NodeId};

pub const NBSP: char = '\u{a0}';

/// Attribute set by `tag.delete.ifempty`, consumed at render time.
const DELETE_IF_EMPTY_ATTR: &str = "__delete_if_empty";
const DELETE_IF_EMPTY_VALUE: &str = "1";

/// Tags with no contents, rendered as `<tag/>`.
/// Source: http://www.w3.org/TR/html-markup/syntax.html#void-element
const VOID_TAGS: [&str; 16] = [
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Characters stripped around tag text contents.
const STRIPPABLE: &[char] = &[' ', '\r', '\n', '\t'];

const AUTO_PARA_TAG_DEFAULT: &str = "p";

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";
const DOCTYPE: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\"\n\
                       \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n";

/// The text an empty element of the given tag should have: `None` keeps the
/// element self-closing, `Some("")` forces `<tag></tag>`.
fn tag_empty_contents(tag: &str) -> Option<String> {
    if VOID_TAGS.contains(&tag) {
        None
    } else {
        Some(String::new())
    }
}

/// Level of a tag, used to paragraph automatically on blank lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagLevel {
    /// Can contain sub-blocks, paragraphs, and inline tags. Example: `<div>`.
    Block,
    /// Paragraph closed manually. Can contain only inline tags.
    /// Example: `<h1>`, `<ul>`.
    Paragraph,
    /// Paragraph closed automatically on blank lines. Example: `<p>`.
    AutoParagraph,
    /// Inline-level element. Example: `<span>`, `<em>`.
    Inline,
}

impl TagLevel {
    fn from_name(name: &str) -> Option<TagLevel> {
        match name {
            "block" => Some(TagLevel::Block),
            "para" => Some(TagLevel::Paragraph),
            "autopara" => Some(TagLevel::AutoParagraph),
            "inline" => Some(TagLevel::Inline),
            _ => None,
        }
    }

    fn is_para(self) -> bool {
        matches!(self, TagLevel::Paragraph | TagLevel::AutoParagraph)
    }

    fn is_auto(self) -> bool {
        self == TagLevel::AutoParagraph
    }

    fn is_inline(self) -> bool {
        self == TagLevel::Inline
    }
}

/// One open element. `auto_para_tag` is the tag to open paragraphs with
/// inside this element; only block elements carry one.
struct ElementFrame {
    elem: NodeId,
    level: TagLevel,
    auto_para_tag: Option<String>,
}

pub struct HtmlBranch {
    pub(crate) doc: Rc<RefCell<Document>>,
    /// Cannot be closed by the branch; siblings and ancestors of this
    /// element are out of reach.
    pub(crate) root_elem: NodeId,
    /// Open elements, root first. Never empty.
    stack: Vec<ElementFrame>,
    /// Merges consecutive text chunks before they hit the tree.
    text_accu: String,
    /// The last chunk of text of the current line; empty if the current
    /// paragraph has no text yet.
    line_tail: String,
    /// Separator to insert before the next chunk of non-whitespace text.
    /// Either empty, a space, or a non-breaking space.
    text_sep: String,
    /// `None` inherits the typography of the parent branch.
    pub(crate) typography: Option<Typography>,
    typography_context: Rc<ExecutionContext>,
}

impl HtmlBranch {
    pub(crate) fn new(
        doc: Rc<RefCell<Document>>,
        root_elem: NodeId,
        typography_context: Rc<ExecutionContext>,
    ) -> HtmlBranch {
        let mut branch = HtmlBranch {
            doc,
            root_elem,
            stack: vec![ElementFrame {
                elem: root_elem,
                level: TagLevel::Block,
                auto_para_tag: Some(AUTO_PARA_TAG_DEFAULT.to_string()),
            }],
            text_accu: String::new(),
            line_tail: String::new(),
            text_sep: String::new(),
            typography: None,
            typography_context,
        };
        branch.auto_para_try_open(None);
        branch
    }

    pub(crate) fn set_typography(&mut self, typography: Typography) {
        self.typography_context.set_macros(typography.macros.clone());
        self.typography = Some(typography);
    }

    fn current_elem(&self) -> NodeId {
        self.stack.last().expect("the stack is never empty").elem
    }

    fn current_level(&self) -> TagLevel {
        self.stack.last().expect("the stack is never empty").level
    }

    /// Appends plain text, ignoring typography and paragraph detection.
    pub fn append_raw_text(&mut self, text: &str) {
        let sep = std::mem::take(&mut self.text_sep);
        self.text_accu.push_str(&sep);
        self.text_accu.push_str(text);
        self.line_tail.clear();
    }

    /// Appends text, opening a new paragraph on each blank line.
    pub fn append_text(&mut self, text: &str) -> Result<(), InternalError> {
        let mut first = true;
        for para in split_paragraphs(text) {
            if !first {
                self.auto_para_try_close()?;
                if !self.auto_para_try_open(None) {
                    return Err(InternalError::new("unable to open a new paragraph"));
                }
            }
            if !para.is_empty() {
                self.append_line_text(para);
            }
            first = false;
        }
        Ok(())
    }

    /// Appends newline-free, non-empty text to the current line, resolving
    /// the pending separator.
    pub fn append_line_text(&mut self, text: &str) {
        let mut text = normalize_line_text(text);
        let sep = std::mem::take(&mut self.text_sep);
        if !sep.is_empty() {
            if text == " " {
                // A lone space is a noop if there is a separator.
                self.text_sep = sep;
                return;
            }
            if text.starts_with(' ') {
                // Insert the separator if it is not a space (i.e. NBSP),
                // consuming the leading space of the text.
                if sep != " " {
                    text.replace_range(..1, &sep);
                }
            } else if !text.starts_with(NBSP) {
                text.insert_str(0, &sep);
            }
            // Separator dropped if the text starts with NBSP.
        }

        // The text ends with a space: move it to a new separator.
        if text.ends_with(' ') {
            self.text_sep = " ".to_string();
            text.pop();
        }

        // Drop space prefixes after a non-breaking space.
        if text.starts_with(' ') && self.line_tail.ends_with(NBSP) {
            text.remove(0);
        }

        if !text.is_empty() {
            self.text_accu.push_str(&text);
            self.line_tail = text;
        }
    }

    /// Starts a new line: drops pending trailing spaces and cancels a
    /// just-requested non-breaking space.
    pub fn append_newline(&mut self) {
        self.line_tail.clear();
        self.text_sep.clear();
    }

    /// Requests a non-breaking space, unless at the beginning or end of a
    /// line or one is already present.
    pub fn require_nbsp(&mut self) {
        if !self.line_tail.is_empty() && !self.line_tail.ends_with(NBSP) {
            self.text_sep = NBSP.to_string();
        }
    }

    /// The tail character of the current line, if any.
    pub fn tail_char(&self) -> Option<char> {
        let tail = if self.text_sep.is_empty() {
            &self.line_tail
        } else {
            &self.text_sep
        };
        tail.chars().last()
    }

    /// Opens a new paragraph if the current element supports them and its
    /// paragraph tag differs from `except_tag`. Returns whether a tag was
    /// opened.
    pub fn auto_para_try_open(&mut self, except_tag: Option<&str>) -> bool {
        let frame = self.stack.last().expect("the stack is never empty");
        let tag = match &frame.auto_para_tag {
            Some(tag) if except_tag != Some(tag.as_str()) => tag.clone(),
            _ => return false,
        };
        // Auto-paragraph tags only exist on block elements, so there is no
        // paragraph to close first.
        self.push_element(&tag, TagLevel::AutoParagraph, None);
        true
    }

    /// Closes the current element if it is an auto-paragraph, discarding it
    /// when empty. Returns whether a tag was closed.
    pub fn auto_para_try_close(&mut self) -> Result<bool, InternalError> {
        if self.current_level() == TagLevel::AutoParagraph {
            self.close_current_element(true)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Flushes the text accumulator to the tree and drops the pending
    /// separator.
    fn flush_text(&mut self) {
        if !self.text_accu.is_empty() {
            let text = std::mem::take(&mut self.text_accu);
            let elem = self.current_elem();
            {
                let mut doc = self.doc.borrow_mut();
                match doc.last_child(elem) {
                    Some(last) => doc.append_to_tail(last, &text),
                    None => doc.append_to_text(elem, &text),
                }
            }
            self.line_tail = text;
        }
        self.text_sep.clear();
    }

    fn push_element(&mut self, tag: &str, level: TagLevel, auto_para_tag: Option<String>) {
        let elem = self.doc.borrow_mut().sub_element(self.current_elem(), tag);
        self.stack.push(ElementFrame {
            elem,
            level,
            auto_para_tag,
        });
        self.auto_para_try_open(None);
    }

    /// Opens a new child tag in the current element and makes it current.
    pub fn open_tag(
        &mut self,
        tag: &str,
        level: TagLevel,
        auto_para_tag: Option<String>,
    ) -> Result<(), InternalError> {
        if level.is_inline() {
            // Flush the separator.
            let sep = std::mem::take(&mut self.text_sep);
            if !sep.is_empty() && (sep != " " || !self.line_tail.ends_with(NBSP)) {
                self.text_accu.push_str(&sep);
                self.line_tail = sep;
            }
            self.flush_text();
        } else {
            self.line_tail.clear();
            self.flush_text();
            self.auto_para_try_close()?;
            if self.current_level().is_inline() {
                return Err(InternalError::new(
                    "impossible to open a non-inline tag inside an inline tag",
                ));
            }
        }
        self.push_element(tag, level, auto_para_tag);
        Ok(())
    }

    /// Closes the first ancestor element with the given tag name, closing
    /// intermediate paragraphs automatically and discarding them when empty.
    /// Fails on intermediate non-paragraph elements.
    pub fn close_tag(&mut self, tag: &str) -> Result<(), InternalError> {
        loop {
            let current_tag = self.doc.borrow().tag(self.current_elem()).to_string();
            if current_tag == tag {
                self.close_current_element(false)?;
                self.auto_para_try_open(Some(tag));
                return Ok(());
            }
            if !self.auto_para_try_close()? {
                return Err(InternalError::new(format!(
                    "expected current tag to be <{tag}>, got <{current_tag}>"
                )));
            }
        }
    }

    fn close_current_element(&mut self, discard_if_empty: bool) -> Result<(), InternalError> {
        self.flush_text();
        if self.stack.len() == 1 {
            return Err(InternalError::new(
                "cannot close the root element of the branch",
            ));
        }
        let closed = self.stack.pop().expect("checked above");
        if !closed.level.is_inline() {
            self.line_tail.clear();
        }

        let mut removed = false;
        if discard_if_empty {
            removed = remove_element_if_empty(&mut self.doc.borrow_mut(), closed.elem, false, false)?;
        }

        if !closed.level.is_inline() && !removed {
            let mut doc = self.doc.borrow_mut();
            if doc.tail(closed.elem).is_none() {
                doc.set_tail(closed.elem, Some("\n".to_string()));
            }
        }
        Ok(())
    }

    /// Executes an action against a target element: `current`, `auto`,
    /// `nonauto`, `parent`, `previous`, `para`, or `<tag>`.
    pub fn register_target_action(
        &mut self,
        target: &str,
        action: impl FnOnce(&mut Document, NodeId),
    ) -> Result<(), InternalError> {
        let elem = self.find_target(target)?;
        action(&mut self.doc.borrow_mut(), elem);
        Ok(())
    }

    fn find_target(&self, target: &str) -> Result<NodeId, InternalError> {
        let doc = self.doc.borrow();
        if target == "previous" {
            // The previous sibling of the deepest open element that has one.
            for frame in self.stack.iter().skip(1).rev() {
                if let Some(prev) = doc.prev_sibling(frame.elem) {
                    return Ok(prev);
                }
            }
            return Err(InternalError::new("no previous element exists"));
        }
        let tag_target = match target {
            "current" | "auto" | "nonauto" | "parent" | "para" => None,
            _ => match target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                Some(tag) if !tag.is_empty() => Some(tag),
                _ => return Err(InternalError::new(format!("invalid target: {target}"))),
            },
        };
        let top = self.stack.len() - 1;
        for (index, frame) in self.stack.iter().enumerate().rev() {
            let matched = match (target, tag_target) {
                (_, Some(tag)) => doc.tag(frame.elem) == tag,
                ("current", _) => true,
                ("auto", _) => frame.level.is_auto(),
                ("nonauto", _) => !frame.level.is_auto(),
                ("parent", _) => index != top,
                ("para", _) => frame.level.is_para(),
                _ => unreachable!("all other targets are handled above"),
            };
            if matched {
                return Ok(frame.elem);
            }
        }
        Err(InternalError::new(format!(
            "no element found for target: {target}"
        )))
    }

    /// Splices a sub-branch's root element at the current position.
    pub(crate) fn append_sub_element(&mut self, sub_root: NodeId) -> Result<(), InternalError> {
        self.flush_text();
        self.auto_para_try_close()?;
        let current = self.current_elem();
        self.doc.borrow_mut().append(current, sub_root);
        self.auto_para_try_open(None);
        Ok(())
    }
}

/// The XHTML document shell of a root branch. Returns the document, the
/// `<body>` element serving as branch root, and the `<head>` element.
pub(crate) fn new_document() -> (Rc<RefCell<Document>>, NodeId, NodeId) {
    let mut doc = Document::new();
    let html = doc.create_element("html");
    doc.set_text(html, Some("\n".to_string()));
    let head = doc.sub_element(html, "head");
    doc.set_text(head, Some("\n".to_string()));
    let meta = doc.sub_element(head, "meta");
    doc.set_attr(meta, "http-equiv", "Content-Type");
    doc.set_attr(meta, "content", "application/xhtml+xml; charset=utf-8");
    doc.set_tail(meta, Some("\n".to_string()));
    doc.set_tail(head, Some("\n".to_string()));
    let body = doc.sub_element(html, "body");
    (Rc::new(RefCell::new(doc)), body, head)
}

/// The typography in effect for a branch: its own if set, else the closest
/// ancestor's.
pub(crate) fn branch_typography(branches: &[Branch], id: BranchId) -> Typography {
    let mut current = Some(id);
    while let Some(id) = current {
        let branch = &branches[id.0];
        if let Some(typography) = branch.kind.html().and_then(|html| html.typography.as_ref()) {
            return typography.clone();
        }
        current = branch.parent;
    }
    // Root HTML branches always carry a typography.
    typography::neutral()
}

/// The current branch as an HTML branch, or an error for the html-only
/// macros called elsewhere.
pub(crate) fn current_html(executor: &mut Executor) -> Result<&mut HtmlBranch, InternalError> {
    let id = executor.current_branch;
    executor.branches[id.0]
        .kind
        .html_mut()
        .ok_or_else(|| InternalError::new("current branch is not an html branch"))
}

/// Splits text on blank lines (two or more consecutive newlines).
fn split_paragraphs(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let run_start = i;
            while i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            if i - run_start >= 2 {
                parts.push(&text[start..run_start]);
                start = i;
            }
        } else {
            i += 1;
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Collapses runs of spaces to one and drops spaces around non-breaking
/// spaces.
fn normalize_line_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        match c {
            ' ' => pending_space = true,
            NBSP => {
                pending_space = false;
                out.push(NBSP);
            }
            _ => {
                if pending_space {
                    if !out.ends_with(NBSP) {
                        out.push(' ');
                    }
                    pending_space = false;
                }
                out.push(c);
            }
        }
    }
    if pending_space && !out.ends_with(NBSP) {
        out.push(' ');
    }
    out
}

/// Removes an element if it has no text and no children. With
/// `preserve_tail`, moves its tail to the element before it. Without
/// `ignore_attribs`, removing an element that still has attributes is an
/// error, except when it carries the delete-if-empty marker.
fn remove_element_if_empty(
    doc: &mut Document,
    elem: NodeId,
    preserve_tail: bool,
    ignore_attribs: bool,
) -> Result<bool, InternalError> {
    let has_text = doc
        .text(elem)
        .is_some_and(|text| !text.trim_matches(STRIPPABLE).is_empty());
    if has_text || doc.child_count(elem) > 0 {
        return Ok(false);
    }

    let parent = doc.parent(elem).expect("only attached elements are removed");
    if preserve_tail {
        let tail = doc
            .tail(elem)
            .map(|tail| tail.trim_matches(STRIPPABLE).to_string())
            .filter(|tail| !tail.is_empty());
        let prev = doc.prev_sibling(elem);
        append_text_to(doc, tail.as_deref(), prev, Some(parent));
    }
    doc.detach(elem);

    if !ignore_attribs
        && doc.has_attrs(elem)
        && doc.get_attr(elem, DELETE_IF_EMPTY_ATTR) != Some(DELETE_IF_EMPTY_VALUE)
    {
        doc.set_text(elem, Some(String::new()));
        let mut serialized = String::new();
        doc.serialize(elem, &mut serialized);
        return Err(InternalError::new(format!(
            "removing an empty element with attributes: {serialized}"
        )));
    }
    Ok(true)
}

/// Appends text to `tail_elem`'s tail if given, else to `text_elem`'s text.
fn append_text_to(
    doc: &mut Document,
    text: Option<&str>,
    tail_elem: Option<NodeId>,
    text_elem: Option<NodeId>,
) {
    let Some(text) = text else { return };
    if text.is_empty() {
        return;
    }
    match tail_elem {
        Some(elem) => doc.append_to_tail(elem, text),
        None => doc.append_to_text(
            text_elem.expect("a destination element is always given"),
            text,
        ),
    }
}

/// Replaces an element with its contents, fixing up text and tails. The
/// element must have no attributes.
fn inline_xml_element(doc: &mut Document, elem: NodeId) -> Result<(), InternalError> {
    let parent = doc
        .parent(elem)
        .expect("attached sub-branch roots have a parent");
    let previous = doc.prev_sibling(elem);

    // Move the head text to the element before (previous sibling if any,
    // else the parent).
    let text = doc.text(elem).map(str::to_string);
    append_text_to(doc, text.as_deref(), previous, Some(parent));

    // Move the tail to the last child or the element before.
    let before = doc.last_child(elem).or(previous);
    let tail = doc.tail(elem).map(str::to_string);
    append_text_to(doc, tail.as_deref(), before, Some(parent));

    // Replace the element with its children.
    for child in doc.children(elem) {
        doc.insert_before(elem, child);
    }
    doc.set_text(elem, None);
    doc.set_tail(elem, None);
    remove_element_if_empty(doc, elem, false, false)?;

    // Render the parent as <tag></tag> instead of <tag/> if necessary.
    if doc.text(parent).map_or(true, str::is_empty) && doc.child_count(parent) == 0 {
        let contents = tag_empty_contents(doc.tag(parent));
        doc.set_text(parent, contents);
    }
    Ok(())
}

/// Closes the remaining auto-paragraphs of a branch, fails on any other
/// still-open element, then inlines the attached sub-branches.
fn finalize_branch(branches: &mut [Branch], id: BranchId) -> Result<(), InternalError> {
    let (doc, sub_branches) = {
        let name = branches[id.0].name.clone().unwrap_or_default();
        let html = branches[id.0]
            .kind
            .html_mut()
            .expect("finalize only runs on html branches");
        html.flush_text();
        while html.auto_para_try_close()? {}
        if html.stack.len() > 1 {
            let tag = html.doc.borrow().tag(html.current_elem()).to_string();
            return Err(InternalError::new(format!(
                "element not closed in branch \"{name}\": <{tag}>"
            )));
        }
        let doc = Rc::clone(&html.doc);
        (doc, branches[id.0].sub_branches.clone())
    };
    for sub in sub_branches {
        if branches[sub.0].attached {
            finalize_branch(branches, sub)?;
            let sub_root = branches[sub.0]
                .kind
                .html()
                .expect("html sub-branches are html")
                .root_elem;
            inline_xml_element(&mut doc.borrow_mut(), sub_root)?;
        }
    }
    Ok(())
}

/// Strips spaces below `<body>`, applies delete-if-empty markers, and
/// comments out `<style>` contents to disable escaping.
fn post_process_elements(
    doc: &mut Document,
    elem: NodeId,
    strip_spaces: bool,
) -> Result<(), InternalError> {
    if !doc.is_element(elem) {
        return Ok(());
    }
    let strip_spaces_child = strip_spaces || doc.tag(elem) == "body";
    for child in doc.children(elem) {
        post_process_elements(doc, child, strip_spaces_child)?;
    }

    if strip_spaces {
        match doc.last_child(elem) {
            Some(last) => {
                let text = doc
                    .text(elem)
                    .unwrap_or("")
                    .trim_start_matches(STRIPPABLE)
                    .to_string();
                doc.set_text(elem, (!text.is_empty()).then_some(text));
                let tail = doc
                    .tail(last)
                    .unwrap_or("")
                    .trim_end_matches(STRIPPABLE)
                    .to_string();
                doc.set_tail(last, (!tail.is_empty()).then_some(tail));
            }
            None => {
                let text = doc
                    .text(elem)
                    .unwrap_or("")
                    .trim_matches(STRIPPABLE)
                    .to_string();
                let new_text = if text.is_empty() {
                    tag_empty_contents(doc.tag(elem))
                } else {
                    Some(text)
                };
                doc.set_text(elem, new_text);
            }
        }
    }

    if doc.take_attr(elem, DELETE_IF_EMPTY_ATTR).as_deref() == Some(DELETE_IF_EMPTY_VALUE) {
        remove_element_if_empty(doc, elem, true, true)?;
    }

    if doc.tag(elem) == "style" {
        if let Some(text) = doc.text(elem).map(str::to_string).filter(|t| !t.is_empty()) {
            let comment = doc.create_comment(format!("\n{text}\n"));
            doc.append(elem, comment);
            doc.set_text(elem, None);
        }
    }
    Ok(())
}

/// Renders a root HTML branch tree as a full XHTML document.
pub(crate) fn render_root(
    branches: &mut [Branch],
    id: BranchId,
    writer: &mut dyn io::Write,
) -> Result<(), InternalError> {
    finalize_branch(branches, id)?;
    let (doc, body) = {
        let html = branches[id.0]
            .kind
            .html()
            .expect("render_root only runs on html branches");
        (Rc::clone(&html.doc), html.root_elem)
    };
    let mut doc = doc.borrow_mut();
    let html_elem = doc.parent(body).expect("the body element sits inside <html>");
    post_process_elements(&mut doc, html_elem, false)?;

    // Insert line breaks around <body>.
    if doc.text(body).map_or(true, str::is_empty) {
        doc.set_text(body, Some("\n".to_string()));
    }
    doc.set_tail(body, Some("\n".to_string()));

    let mut out = String::new();
    out.push_str(XML_HEADER);
    out.push_str(DOCTYPE);
    doc.serialize(html_elem, &mut out);
    writer
        .write_all(out.as_bytes())
        .map_err(|e| InternalError::new(format!("unable to write output: {e}")))
}

/// The macros of HTML branches.
pub(crate) fn html_macros() -> MacroMap {
    let mut macros = MacroMap::new();

    macros.insert(
        "par".to_string(),
        MacroBinding::builtin("", false, |executor, _, _| {
            let branch = current_html(executor)?;
            branch.auto_para_try_close()?;
            if !branch.auto_para_try_open(None) {
                return Err(InternalError::new("unable to open a new paragraph").into());
            }
            Ok(())
        }),
    );

    macros.insert(
        "tag.open".to_string(),
        MacroBinding::builtin("tag,level_name", false, |executor, _, args| {
            let level_name = args.text(1);
            let (level, auto_para_tag) = match level_name.strip_prefix("block,autopara=") {
                Some(auto) if !auto.is_empty() => {
                    if VOID_TAGS.contains(&auto) {
                        return Err(InternalError::new(format!(
                            "cannot use void tag as autopara: <{auto}>"
                        ))
                        .into());
                    }
                    (TagLevel::Block, Some(auto.to_string()))
                }
                _ => match TagLevel::from_name(level_name) {
                    Some(level) => (level, None),
                    None => {
                        return Err(InternalError::new(format!(
                            "unknown level: {level_name}; \
                             expected one of: autopara, block, inline, para."
                        ))
                        .into())
                    }
                },
            };
            let tag = args.text(0).to_string();
            current_html(executor)?.open_tag(&tag, level, auto_para_tag)?;
            Ok(())
        }),
    );

    macros.insert(
        "tag.close".to_string(),
        MacroBinding::builtin("tag", false, |executor, _, args| {
            let tag = args.text(0).to_string();
            current_html(executor)?.close_tag(&tag)?;
            Ok(())
        }),
    );

    macros.insert(
        "tag.body.raw".to_string(),
        MacroBinding::builtin("text", false, |executor, _, args| {
            current_html(executor)?.append_raw_text(args.text(0));
            Ok(())
        }),
    );

    macros.insert(
        "tag.delete.ifempty".to_string(),
        MacroBinding::builtin("target", false, |executor, _, args| {
            tag_attr_set(
                executor,
                args.text(0),
                DELETE_IF_EMPTY_ATTR,
                DELETE_IF_EMPTY_VALUE,
            )
        }),
    );

    macros.insert(
        "tag.attr.set".to_string(),
        MacroBinding::builtin("target,attr_name,value", false, |executor, _, args| {
            tag_attr_set(executor, args.text(0), args.text(1), args.text(2))
        }),
    );

    macros.insert(
        "tag.class.add".to_string(),
        MacroBinding::builtin("target,class_name", false, |executor, _, args| {
            let class_names: Vec<String> = args
                .text(1)
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let branch = current_html(executor)?;
            branch.register_target_action(args.text(0), move |doc, elem| {
                if class_names.is_empty() {
                    return;
                }
                // Preserve ordering, meaningful in CSS.
                let mut all: Vec<String> = doc
                    .get_attr(elem, "class")
                    .unwrap_or("")
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                for class_name in class_names {
                    if !all.contains(&class_name) {
                        all.push(class_name);
                    }
                }
                doc.set_attr(elem, "class", &all.join(" "));
            })?;
            Ok(())
        }),
    );

    macros.insert(
        "typo.name".to_string(),
        MacroBinding::builtin("", true, |executor, _, _| {
            current_html(executor)?;
            let name = branch_typography(&executor.branches, executor.current_branch).name;
            executor.append_text(name)?;
            Ok(())
        }),
    );

    macros.insert(
        "typo.set".to_string(),
        MacroBinding::builtin("typo_name", false, |executor, _, args| {
            let typo_name = args.text(0);
            let Some(typography) = typography::find(typo_name) else {
                return Err(InternalError::new(format!(
                    "unknown typography name: {typo_name}; \
                     expected one of: english, french, neutral"
                ))
                .into());
            };
            current_html(executor)?.set_typography(typography);
            Ok(())
        }),
    );

    macros.insert(
        "typo.number".to_string(),
        MacroBinding::builtin("number", false, |executor, _, args| {
            let number = args.text(0);
            if !typography::is_number(number) {
                return Err(InternalError::new(format!("invalid integer: {number}")).into());
            }
            current_html(executor)?;
            // Numbers follow the root branch's typography.
            let root = executor.branches[executor.current_branch.0].root;
            let format = branch_typography(&executor.branches, root).format_number;
            let formatted = format(number);
            executor.append_text(&formatted)?;
            Ok(())
        }),
    );

    macros.insert(
        "typo.newline".to_string(),
        MacroBinding::builtin("", false, |executor, _, _| {
            current_html(executor)?.append_newline();
            Ok(())
        }),
    );

    macros
}

fn tag_attr_set(
    executor: &mut Executor,
    target: &str,
    attr_name: &str,
    value: &str,
) -> Result<(), ExecError> {
    if attr_name.trim().is_empty() {
        return Err(InternalError::new("attribute name cannot be empty").into());
    }
    let branch = current_html(executor)?;
    branch.register_target_action(target, |doc, elem| doc.set_attr(elem, attr_name, value))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_branch() -> HtmlBranch {
        let mut doc = Document::new();
        let body = doc.create_element("body");
        HtmlBranch::new(
            Rc::new(RefCell::new(doc)),
            body,
            ExecutionContext::new(None),
        )
    }

    fn render(branch: &mut HtmlBranch) -> String {
        branch.flush_text();
        while branch.auto_para_try_close().unwrap() {}
        let doc = branch.doc.borrow();
        let mut out = String::new();
        doc.serialize(branch.root_elem, &mut out);
        out
    }

    #[test]
    fn blank_line_opens_new_paragraph() {
        let mut branch = new_branch();
        branch.append_text("one\n\ntwo").unwrap();
        assert_eq!(render(&mut branch), "<body><p>one</p>\n<p>two</p>\n</body>");
    }

    #[test]
    fn empty_auto_paragraph_is_discarded() {
        let mut branch = new_branch();
        assert_eq!(render(&mut branch), "<body/>");
    }

    #[test]
    fn inline_tags_keep_surrounding_spaces() {
        let mut branch = new_branch();
        branch.append_text("a ").unwrap();
        branch.open_tag("span", TagLevel::Inline, None).unwrap();
        branch.append_text("b").unwrap();
        branch.close_tag("span").unwrap();
        branch.append_text(" c").unwrap();
        assert_eq!(
            render(&mut branch),
            "<body><p>a <span>b</span> c</p>\n</body>"
        );
    }

    #[test]
    fn close_tag_auto_closes_paragraphs() {
        let mut branch = new_branch();
        branch
            .open_tag("div", TagLevel::Block, Some("p".to_string()))
            .unwrap();
        branch.append_text("inside").unwrap();
        branch.close_tag("div").unwrap();
        assert_eq!(
            render(&mut branch),
            "<body><div><p>inside</p>\n</div>\n</body>"
        );
    }

    #[test]
    fn close_tag_mismatch_fails() {
        let mut branch = new_branch();
        branch.open_tag("div", TagLevel::Block, None).unwrap();
        let err = branch.close_tag("span").unwrap_err();
        assert_eq!(
            err.message,
            "expected current tag to be <span>, got <div>"
        );
    }

    #[test]
    fn non_inline_inside_inline_fails() {
        let mut branch = new_branch();
        branch.open_tag("span", TagLevel::Inline, None).unwrap();
        let err = branch.open_tag("div", TagLevel::Block, None).unwrap_err();
        assert_eq!(
            err.message,
            "impossible to open a non-inline tag inside an inline tag"
        );
    }

    #[test]
    fn require_nbsp_inserts_once() {
        let mut branch = new_branch();
        branch.append_line_text("word");
        branch.require_nbsp();
        branch.require_nbsp();
        branch.append_line_text("!");
        assert_eq!(render(&mut branch), "<body><p>word\u{a0}!</p>\n</body>");
    }

    #[test]
    fn nbsp_absorbs_spaces() {
        assert_eq!(normalize_line_text("a \u{a0} b"), "a\u{a0}b");
        assert_eq!(normalize_line_text("a    b"), "a b");
        assert_eq!(normalize_line_text("  a  "), " a ");
    }

    #[test]
    fn newline_cancels_pending_separator() {
        let mut branch = new_branch();
        branch.append_line_text("word");
        branch.require_nbsp();
        branch.append_newline();
        branch.append_line_text("next");
        assert_eq!(render(&mut branch), "<body><p>wordnext</p>\n</body>");
    }

    #[test]
    fn tail_char_sees_separator_first() {
        let mut branch = new_branch();
        assert_eq!(branch.tail_char(), None);
        branch.append_line_text("ab");
        assert_eq!(branch.tail_char(), Some('b'));
        branch.require_nbsp();
        assert_eq!(branch.tail_char(), Some(NBSP));
    }

    #[test]
    fn target_resolution() {
        let mut branch = new_branch();
        branch
            .open_tag("div", TagLevel::Block, None)
            .unwrap();
        branch.open_tag("span", TagLevel::Inline, None).unwrap();
        let doc = Rc::clone(&branch.doc);

        branch
            .register_target_action("current", |doc, elem| doc.set_attr(elem, "a", "1"))
            .unwrap();
        branch
            .register_target_action("<div>", |doc, elem| doc.set_attr(elem, "b", "2"))
            .unwrap();
        branch
            .register_target_action("parent", |doc, elem| doc.set_attr(elem, "c", "3"))
            .unwrap();

        let doc = doc.borrow();
        let body = branch.root_elem;
        let div = doc.children(body)[0];
        let span = doc.children(div)[0];
        assert_eq!(doc.get_attr(span, "a"), Some("1"));
        assert_eq!(doc.get_attr(div, "b"), Some("2"));
        assert_eq!(doc.get_attr(div, "c"), Some("3"));
    }

    #[test]
    fn invalid_targets_fail() {
        let mut branch = new_branch();
        let err = branch.find_target("bogus").unwrap_err();
        assert_eq!(err.message, "invalid target: bogus");
        let err = branch.find_target("previous").unwrap_err();
        assert_eq!(err.message, "no previous element exists");
        let err = branch.find_target("<table>").unwrap_err();
        assert_eq!(err.message, "no element found for target: <table>");
    }

    #[test]
    fn removing_empty_element_with_attributes_fails() {
        let mut branch = new_branch();
        branch
            .register_target_action("current", |doc, elem| doc.set_attr(elem, "class", "x"))
            .unwrap();
        let err = branch.auto_para_try_close().unwrap_err();
        assert_eq!(
            err.message,
            "removing an empty element with attributes: <p class=\"x\"></p>"
        );
    }

    #[test]
    fn paragraph_splitting() {
        assert_eq!(split_paragraphs("a\nb"), vec!["a\nb"]);
        assert_eq!(split_paragraphs("a\n\nb"), vec!["a", "b"]);
        assert_eq!(split_paragraphs("a\n\n\n\nb\n\n"), vec!["a", "b", ""]);
    }

    #[test]
    fn void_tags_self_close() {
        assert_eq!(tag_empty_contents("br"), None);
        assert_eq!(tag_empty_contents("p"), Some(String::new()));
    }

    #[test]
    fn raw_text_skips_typography_state() {
        let mut branch = new_branch();
        branch.append_line_text("a ");
        branch.append_raw_text("<kept>");
        assert_eq!(render(&mut branch), "<body><p>a &lt;kept&gt;</p>\n</body>");
    }
}
