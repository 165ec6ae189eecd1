//! The branch tree: deferred output documents.
//!
//! Execution appends to branches instead of writing output directly. A
//! branch owns an execution context, an optional output writer (root
//! branches only), and a list of sub-branches. A sub-branch accumulates
//! content on the side until it is spliced into its parent at the position
//! where `branch.append` is executed; unattached sub-branches are silently
//! dropped at render time.
//!
//! Branches live in an arena owned by the [`Executor`], addressed by
//! [`BranchId`].

use std::io;
use std::rc::Rc;

use crate::branch::latex::latex_macros;
use crate::branch::text::{TextBranch, TextOutput};
use crate::context::{ExecutionContext, MacroBinding};
use crate::error::{FatalError, InternalError};
use crate::executor::Executor;
use crate::html::{self, HtmlBranch};
use crate::typography;

mod latex;
mod text;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchType {
    Text,
    Latex,
    Html,
}

impl BranchType {
    pub fn from_name(name: &str) -> Option<BranchType> {
        match name {
            "text" => Some(BranchType::Text),
            "latex" => Some(BranchType::Latex),
            "html" => Some(BranchType::Html),
            _ => None,
        }
    }
}

pub struct Branch {
    pub(crate) parent: Option<BranchId>,
    /// The root of the branch tree this branch belongs to.
    pub(crate) root: BranchId,
    pub(crate) name: Option<String>,
    pub(crate) attached: bool,
    pub(crate) context: Rc<ExecutionContext>,
    pub(crate) sub_branches: Vec<BranchId>,
    /// Root branches only; `None` renders nowhere.
    pub(crate) writer: Option<Box<dyn io::Write>>,
    pub(crate) kind: BranchKind,
}

impl Branch {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn context(&self) -> &Rc<ExecutionContext> {
        &self.context
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

pub(crate) enum BranchKind {
    Text(TextBranch),
    Latex(TextBranch),
    Html(HtmlBranch),
}

impl BranchKind {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            BranchKind::Text(_) => "text",
            BranchKind::Latex(_) => "latex",
            BranchKind::Html(_) => "html",
        }
    }

    pub(crate) fn text_mut(&mut self) -> &mut TextBranch {
        match self {
            BranchKind::Text(branch) | BranchKind::Latex(branch) => branch,
            BranchKind::Html(_) => panic!("expected a text branch"),
        }
    }

    pub(crate) fn html(&self) -> Option<&HtmlBranch> {
        match self {
            BranchKind::Html(branch) => Some(branch),
            _ => None,
        }
    }

    pub(crate) fn html_mut(&mut self) -> Option<&mut HtmlBranch> {
        match self {
            BranchKind::Html(branch) => Some(branch),
            _ => None,
        }
    }
}

impl Executor {
    /// Creates a branch and returns its id. The branch is not registered
    /// in the name registry; see [`Executor::register_branch`].
    pub fn create_branch(
        &mut self,
        branch_type: BranchType,
        parent: Option<BranchId>,
        parent_context: Option<Rc<ExecutionContext>>,
        name: Option<String>,
        writer: Option<Box<dyn io::Write>>,
    ) -> BranchId {
        let id = BranchId(self.branches.len());
        let root = parent.map(|p| self.branches[p.0].root).unwrap_or(id);

        let parent_context =
            parent_context.or_else(|| parent.map(|p| Rc::clone(&self.branches[p.0].context)));
        let base_context = ExecutionContext::new(parent_context);
        base_context.add_macro(
            "branch.type",
            MacroBinding::append_text(branch_type_name(branch_type)),
        );

        let (kind, context, head_elem) = match branch_type {
            BranchType::Text => (BranchKind::Text(TextBranch::new()), base_context, None),
            BranchType::Latex => {
                if parent.is_none() {
                    base_context.add_macros(&latex_macros());
                }
                (BranchKind::Latex(TextBranch::new()), base_context, None)
            }
            BranchType::Html => {
                if parent.is_none() {
                    base_context.add_macros(&html::html_macros());
                }
                // Each branch gets a dedicated context layer that holds the
                // typography rebindings, below the context user macros go to.
                let typography_context = ExecutionContext::new(Some(base_context));
                let context = ExecutionContext::new(Some(Rc::clone(&typography_context)));
                let (doc, root_elem, head_elem) = match parent {
                    Some(p) => {
                        let doc = match &self.branches[p.0].kind {
                            BranchKind::Html(parent_html) => Rc::clone(&parent_html.doc),
                            _ => panic!("sub-branches keep their parent's type"),
                        };
                        // Placeholder element, inlined away at attachment.
                        let root_elem = doc.borrow_mut().create_element("branch");
                        (doc, root_elem, None)
                    }
                    None => {
                        let (doc, body, head) = html::new_document();
                        (doc, body, Some(head))
                    }
                };
                let mut branch = HtmlBranch::new(doc, root_elem, typography_context);
                if parent.is_none() {
                    branch.set_typography(typography::neutral());
                }
                (BranchKind::Html(branch), context, head_elem)
            }
        };

        self.branches.push(Branch {
            parent,
            root,
            name,
            attached: false,
            context,
            sub_branches: Vec::new(),
            writer,
            kind,
        });
        if let Some(p) = parent {
            self.branches[p.0].sub_branches.push(id);
        }

        // A root HTML branch owns an implicit, pre-attached sub-branch for
        // the <head> element.
        if let Some(head_elem) = head_elem {
            let head_id = self.create_branch(
                BranchType::Html,
                Some(id),
                None,
                Some("head".into()),
                None,
            );
            let (doc, head_root) = match &self.branches[head_id.0].kind {
                BranchKind::Html(head_html) => {
                    (Rc::clone(&head_html.doc), head_html.root_elem)
                }
                _ => unreachable!(),
            };
            doc.borrow_mut().append(head_elem, head_root);
            self.branches[head_id.0].attached = true;
        }
        id
    }

    /// Creates an unattached sub-branch of the same type as its parent.
    /// LaTeX branches spawn plain text sub-branches.
    pub fn create_sub_branch(&mut self, parent: BranchId, name: Option<String>) -> BranchId {
        let branch_type = match &self.branches[parent.0].kind {
            BranchKind::Text(_) | BranchKind::Latex(_) => BranchType::Text,
            BranchKind::Html(_) => BranchType::Html,
        };
        self.create_branch(branch_type, Some(parent), None, name, None)
    }

    /// Registers a branch and all its sub-branches in the name registry,
    /// assigning `auto<N>` names to unnamed branches.
    pub fn register_branch(&mut self, id: BranchId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let name = match &self.branches[current.0].name {
                Some(name) => name.clone(),
                None => {
                    let name = format!("auto{}", self.registry.len());
                    self.branches[current.0].name = Some(name.clone());
                    name
                }
            };
            self.registry.insert(name, current);
            if self.branches[current.0].parent.is_none() {
                self.root_branches.push(current);
            }
            for sub in self.branches[current.0].sub_branches.iter().rev() {
                stack.push(*sub);
            }
        }
    }

    pub fn find_branch(&self, name: &str) -> Option<BranchId> {
        self.registry.get(name).copied()
    }

    pub fn branch(&self, id: BranchId) -> &Branch {
        &self.branches[id.0]
    }

    /// Splices `sub` into the current branch at the current position.
    /// The sub-branch must have been created by the current branch and not
    /// be attached yet.
    pub fn append_sub_branch(&mut self, sub: BranchId) -> Result<(), InternalError> {
        let parent = self.current_branch;
        if self.branches[sub.0].parent != Some(parent) {
            let parent_name = self.branch_display_name(Some(parent));
            let creator_name = self.branch_display_name(self.branches[sub.0].parent);
            return Err(InternalError::new(format!(
                "expected a sub-branch created by branch '{parent_name}'; \
                 got one created by branch '{creator_name}'"
            )));
        }
        if self.branches[sub.0].attached {
            let name = self.branch_display_name(Some(sub));
            return Err(InternalError::new(format!(
                "the sub-branch '{name}' is already attached"
            )));
        }
        match &self.branches[parent.0].kind {
            BranchKind::Text(_) | BranchKind::Latex(_) => {
                self.branches[parent.0].kind.text_mut().append_sub(sub);
            }
            BranchKind::Html(_) => {
                let sub_root = match &self.branches[sub.0].kind {
                    BranchKind::Html(sub_html) => sub_html.root_elem,
                    _ => unreachable!("html sub-branches are html"),
                };
                let parent_html = self.branches[parent.0]
                    .kind
                    .html_mut()
                    .expect("checked above");
                parent_html.append_sub_element(sub_root)?;
            }
        }
        self.branches[sub.0].attached = true;
        Ok(())
    }

    fn branch_display_name(&self, id: Option<BranchId>) -> String {
        id.and_then(|id| self.branches[id.0].name.clone())
            .unwrap_or_default()
    }

    pub(crate) fn branch_append_text(
        &mut self,
        id: BranchId,
        text: &str,
    ) -> Result<(), InternalError> {
        match &mut self.branches[id.0].kind {
            BranchKind::Text(branch) | BranchKind::Latex(branch) => {
                branch.append_text(text);
                Ok(())
            }
            BranchKind::Html(branch) => branch.append_text(text),
        }
    }

    /// Renders every root branch that has a writer, then flushes it.
    pub fn render_branches(&mut self) -> Result<(), FatalError> {
        for id in self.root_branches.clone() {
            let writer = self.branches[id.0].writer.take();
            if let Some(mut writer) = writer {
                let result = self.render_branch_to(id, writer.as_mut());
                let flushed = writer.flush();
                self.branches[id.0].writer = Some(writer);
                result.map_err(|e| FatalError::message_only(e.message))?;
                flushed.map_err(|e| {
                    FatalError::message_only(format!("unable to write output: {e}"))
                })?;
            }
        }
        Ok(())
    }

    /// Renders one branch tree into a writer. Consumes the branch contents;
    /// a branch renders once.
    pub(crate) fn render_branch_to(
        &mut self,
        id: BranchId,
        writer: &mut dyn io::Write,
    ) -> Result<(), InternalError> {
        match &self.branches[id.0].kind {
            BranchKind::Text(_) | BranchKind::Latex(_) => {
                render_text_branch(&mut self.branches, id, writer)
            }
            BranchKind::Html(_) => html::render_root(&mut self.branches, id, writer),
        }
    }
}

fn branch_type_name(branch_type: BranchType) -> &'static str {
    match branch_type {
        BranchType::Text => "text",
        BranchType::Latex => "latex",
        BranchType::Html => "html",
    }
}

fn render_text_branch(
    branches: &mut [Branch],
    id: BranchId,
    writer: &mut dyn io::Write,
) -> Result<(), InternalError> {
    let outputs = {
        let branch = branches[id.0].kind.text_mut();
        branch.flush();
        std::mem::take(&mut branch.outputs)
    };
    for output in outputs {
        match output {
            TextOutput::Text(text) => writer
                .write_all(text.as_bytes())
                .map_err(|e| InternalError::new(format!("unable to write output: {e}")))?,
            TextOutput::Sub(sub) => render_text_branch(branches, sub, writer)?,
        }
    }
    Ok(())
}
