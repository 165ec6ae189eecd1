//! The executor: walks node trees and dispatches macro calls.
//!
//! The executor owns the branch arena and the macro call stack. Macro names
//! resolve through the call context first (arguments of the user macro being
//! expanded), then through the context chain of the current branch. Errors
//! raised inside a callback are internal until they cross the call node, at
//! which point they pick up the node location and the call stack.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use crate::branch::{Branch, BranchId, BranchType};
use crate::context::{ExecutionContext, MacroBinding, MacroMap};
use crate::error::{CallFrame, ExecError, FatalError, InternalError, Logger};
use crate::node::{CallNode, Location, Node, SourceName};
use crate::parse;

pub const MAX_NESTED_CALLS: usize = 100;
pub const MAX_NESTED_INCLUDES: usize = 25;

/// Extension appended to input paths given without one.
pub const SCRIBE_EXT: &str = ".psc";

/// File access of the executor, swappable for tests.
pub trait FileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn create_write(&mut self, path: &Path) -> io::Result<Box<dyn Write>>;
}

pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_write(&mut self, path: &Path) -> io::Result<Box<dyn Write>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(fs::File::create(path)?))
    }
}

pub struct Executor {
    output_dir: PathBuf,
    pub logger: Logger,
    fs: Box<dyn FileSystem>,
    /// Output files opened so far; opening one twice is an error.
    writer_paths: HashSet<PathBuf>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) registry: HashMap<String, BranchId>,
    pub(crate) root_branches: Vec<BranchId>,
    /// The text branch holding the built-in macros; never rendered.
    pub system_branch: BranchId,
    pub current_branch: BranchId,
    /// Context of the arguments of the user macro being expanded; checked
    /// before the current branch's context chain.
    pub call_context: Rc<ExecutionContext>,
    /// `Some` while output is captured as text instead of going to the
    /// current branch.
    text_capture: Option<String>,
    call_stack: Vec<CallFrame>,
    include_depth: usize,
}

impl Executor {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        logger: Logger,
        fs: Box<dyn FileSystem>,
        built_ins: MacroMap,
    ) -> Executor {
        let mut executor = Executor {
            output_dir: normalize_path(&output_dir.into()),
            logger,
            fs,
            writer_paths: HashSet::new(),
            branches: Vec::new(),
            registry: HashMap::new(),
            root_branches: Vec::new(),
            system_branch: BranchId(0),
            current_branch: BranchId(0),
            call_context: ExecutionContext::new(None),
            text_capture: None,
            call_stack: Vec::new(),
            include_depth: 0,
        };
        let system =
            executor.create_branch(BranchType::Text, None, None, Some("system".to_string()), None);
        executor.branches[system.0].context.add_macros(&built_ins);
        executor.register_branch(system);
        executor.system_branch = system;
        executor.current_branch = system;
        executor
    }

    /// Defines constant text macros in the system branch context, visible
    /// everywhere. Used for command-line definitions.
    pub fn add_constants(&mut self, constants: impl IntoIterator<Item = (String, String)>) {
        let context = Rc::clone(&self.branches[self.system_branch.0].context);
        for (name, text) in constants {
            context.add_macro(name, MacroBinding::append_text(text));
        }
    }

    pub fn current_branch_context(&self) -> Rc<ExecutionContext> {
        Rc::clone(&self.branches[self.current_branch.0].context)
    }

    pub fn branch_context(&self, id: BranchId) -> Rc<ExecutionContext> {
        Rc::clone(&self.branches[id.0].context)
    }

    /// Appends text to the current output: the active text capture if any,
    /// else the current branch.
    pub fn append_text(&mut self, text: &str) -> Result<(), InternalError> {
        if let Some(capture) = &mut self.text_capture {
            capture.push_str(text);
            return Ok(());
        }
        let id = self.current_branch;
        self.branch_append_text(id, text)
    }

    pub fn execute_nodes(&mut self, nodes: &[Node]) -> Result<(), ExecError> {
        for node in nodes {
            match node {
                Node::Text(text) => {
                    if let Err(e) = self.append_text(&text.text) {
                        return Err(self.fatal_error(&text.location, e.message, 0));
                    }
                }
                Node::Call(call) => self.call_macro(call)?,
            }
        }
        Ok(())
    }

    pub fn call_macro(&mut self, call_node: &CallNode) -> Result<(), ExecError> {
        let text_compatible = self.text_capture.is_some();
        let Some(binding) = self.lookup_macro(&call_node.name, text_compatible) else {
            if text_compatible && self.lookup_macro(&call_node.name, false).is_some() {
                return Err(self.macro_fatal_error(call_node, "text-incompatible macro call", 0));
            }
            return Err(self.fatal_error(
                &call_node.location,
                format!("macro not found: ${}", call_node.name),
                0,
            ));
        };
        if self.call_stack.len() >= MAX_NESTED_CALLS {
            return Err(self.macro_fatal_error(call_node, "too many nested macro calls", 0));
        }
        self.call_stack.push(CallFrame {
            location: call_node.location.clone(),
            name: call_node.name.clone(),
        });
        let result = (binding.callback)(self, call_node);
        self.call_stack.pop();
        match result {
            Ok(()) => Ok(()),
            // The macro's own frame is already popped: the error points at
            // the call node, and the stack lists the enclosing calls.
            Err(ExecError::Internal(e)) => Err(self.macro_fatal_error(call_node, e.message, 0)),
            Err(fatal) => Err(fatal),
        }
    }

    /// Resolves a macro name: call context first, then the current branch.
    pub fn lookup_macro(&self, name: &str, text_compatible: bool) -> Option<Rc<MacroBinding>> {
        self.call_context
            .lookup_macro(name, text_compatible)
            .or_else(|| {
                self.branches[self.current_branch.0]
                    .context
                    .lookup_macro(name, text_compatible)
            })
    }

    /// A fatal error at `location` carrying the current call stack, most
    /// recent call first. `skip` drops that many innermost frames.
    pub fn fatal_error(
        &self,
        location: &Location,
        message: impl Into<String>,
        skip: usize,
    ) -> ExecError {
        let end = self.call_stack.len().saturating_sub(skip);
        ExecError::Fatal(FatalError {
            location: Some(location.clone()),
            message: message.into(),
            call_stack: self.call_stack[..end].iter().rev().cloned().collect(),
        })
    }

    /// A fatal error blaming a macro call: `$name: details`.
    pub fn macro_fatal_error(
        &self,
        call_node: &CallNode,
        details: impl Into<String>,
        skip: usize,
    ) -> ExecError {
        self.fatal_error(
            &call_node.location,
            format!("${}: {}", call_node.name, details.into()),
            skip,
        )
    }

    pub fn check_argument_count(
        &self,
        call_node: &CallNode,
        args_signature: &str,
        min_args: usize,
        max_args: Option<usize>,
    ) -> Result<(), ExecError> {
        let actual = call_node.args.len();
        let ok = match max_args {
            Some(max) => (min_args..=max).contains(&actual),
            None => actual >= min_args,
        };
        if ok {
            return Ok(());
        }
        let signature = if args_signature.is_empty() {
            format!("${}", call_node.name)
        } else {
            format!("${}({})", call_node.name, args_signature)
        };
        let expected = match max_args {
            None => format!("at least {min_args}"),
            Some(max) if max != min_args => format!("{min_args}..{max}"),
            Some(_) => format!("{min_args}"),
        };
        // The macro's own frame is on the stack at this point; skip it.
        Err(self.fatal_error(
            &call_node.location,
            format!("{signature}: arguments count mismatch: expected {expected}, got {actual}"),
            1,
        ))
    }

    /// Executes nodes with the output captured as text.
    pub fn eval_text(&mut self, nodes: &[Node]) -> Result<String, ExecError> {
        let saved = self.text_capture.replace(String::new());
        let result = self.execute_nodes(nodes);
        let captured = std::mem::replace(&mut self.text_capture, saved);
        result?;
        Ok(captured.expect("the capture was just installed"))
    }

    /// Executes nodes with the given call context, if any, restored
    /// afterwards.
    pub fn execute_in_call_context(
        &mut self,
        nodes: &[Node],
        call_context: Option<Rc<ExecutionContext>>,
    ) -> Result<(), ExecError> {
        match call_context {
            Some(context) => {
                let saved = std::mem::replace(&mut self.call_context, context);
                let result = self.execute_nodes(nodes);
                self.call_context = saved;
                result
            }
            None => self.execute_nodes(nodes),
        }
    }

    /// Executes nodes with the current branch's context temporarily
    /// replaced.
    pub fn execute_in_branch_context(
        &mut self,
        nodes: &[Node],
        context: Rc<ExecutionContext>,
    ) -> Result<(), ExecError> {
        let id = self.current_branch;
        let saved = std::mem::replace(&mut self.branches[id.0].context, context);
        let result = self.execute_nodes(nodes);
        self.branches[id.0].context = saved;
        result
    }

    /// Parses and executes a source file.
    pub fn execute_file(&mut self, path: &Path) -> Result<(), ExecError> {
        if self.include_depth >= MAX_NESTED_INCLUDES {
            return Err(InternalError::new("too many nested includes").into());
        }
        let input = self.fs.read_to_string(path).map_err(|_| {
            InternalError::new(format!("unable to read the input file: {}", path.display()))
        })?;
        let display = path.to_string_lossy().into_owned();
        let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let source = SourceName::new(display, dir);
        let nodes = parse::parse_text(&input, source).map_err(ExecError::Fatal)?;
        self.include_depth += 1;
        let result = self.execute_nodes(&nodes);
        self.include_depth -= 1;
        result
    }

    /// Resolves a possibly relative input path against `current_dir`,
    /// appending `default_ext` when the path has no extension and does not
    /// name an existing file.
    pub fn resolve_file_path(
        &self,
        path: &Path,
        current_dir: &Path,
        default_ext: Option<&str>,
    ) -> PathBuf {
        let full = normalize_path(&current_dir.join(path));
        if let Some(ext) = default_ext {
            if full.extension().is_none() && !self.fs.exists(&full) {
                let mut with_ext = full.into_os_string();
                with_ext.push(ext);
                return PathBuf::from(with_ext);
            }
        }
        full
    }

    /// Reads a text file through the executor's file system. Used by the
    /// verbatim include macro.
    pub fn read_text_file(&self, path: &Path) -> io::Result<String> {
        self.fs.read_to_string(path)
    }

    /// Opens an output file below the output directory.
    pub fn get_output_writer(&mut self, filename: &str) -> Result<Box<dyn Write>, InternalError> {
        let full = normalize_path(&self.output_dir.join(filename));
        if !full.starts_with(&self.output_dir) {
            return Err(InternalError::new(format!(
                "invalid output file name: '{filename}'; must be below the output directory"
            )));
        }
        if !self.writer_paths.insert(full.clone()) {
            return Err(InternalError::new(format!(
                "output file already opened: {}",
                full.display()
            )));
        }
        self.logger.info(&format!("Writing: {}", full.display()));
        self.fs.create_write(&full).map_err(|e| {
            InternalError::new(format!("unable to open the output file: {}: {e}", full.display()))
        })
    }
}

/// Lexically removes `.` and `..` components.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other),
        }
    }
    result
}
