//! Execution contexts and macro bindings.
//!
//! An [`ExecutionContext`] is one scope in a chain: a map of macro bindings
//! plus an optional parent. Lookup walks the chain from the innermost scope
//! outwards. Contexts are shared with `Rc`; a context's own map can still be
//! extended after it has been captured as a parent, and macros defined later
//! become visible through all chains that pass through it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ExecError;
use crate::executor::Executor;
use crate::node::{CallNode, Node, NodeList};

pub type MacroFn = Rc<dyn Fn(&mut Executor, &CallNode) -> Result<(), ExecError>>;

/// A callback run before or after a user macro body, installed by wrapping.
pub type HookFn = Rc<dyn Fn(&mut Executor) -> Result<(), ExecError>>;

pub type MacroMap = HashMap<String, Rc<MacroBinding>>;

/// Head and tail hook lists of a wrappable macro.
///
/// The lists are shared so that wrapping mutates the binding in place: calls
/// already scheduled through an outer context see the new hooks too.
#[derive(Clone, Default)]
pub struct MacroHooks {
    pub head: Rc<RefCell<Vec<HookFn>>>,
    pub tail: Rc<RefCell<Vec<HookFn>>>,
}

pub struct MacroBinding {
    /// Human-readable parameter list, shown in arity error messages.
    pub args_signature: String,
    /// Whether the macro may be called while output is being captured as
    /// text. Macros that manipulate document structure are not.
    pub text_compatible: bool,
    /// Built-in macros cannot be overridden or wrapped.
    pub builtin: bool,
    pub callback: MacroFn,
    /// `Some` only for user macros created by `macro.new`.
    pub hooks: Option<MacroHooks>,
}

impl MacroBinding {
    /// A constant: calling it appends the given text to the current output.
    pub fn append_text(text: impl Into<String>) -> Rc<MacroBinding> {
        let text = text.into();
        Rc::new(MacroBinding {
            args_signature: String::new(),
            text_compatible: true,
            builtin: true,
            hooks: None,
            callback: Rc::new(move |executor, _| {
                executor.append_text(&text)?;
                Ok(())
            }),
        })
    }

    /// A macro that replays pre-parsed nodes, optionally in a fixed call
    /// context. Used for branch name references and argument bindings.
    pub fn execute_nodes(
        nodes: NodeList,
        call_context: Option<Rc<ExecutionContext>>,
    ) -> Rc<MacroBinding> {
        Rc::new(MacroBinding {
            args_signature: String::new(),
            text_compatible: true,
            builtin: true,
            hooks: None,
            callback: Rc::new(move |executor, _| {
                executor.execute_in_call_context(&nodes, call_context.clone())
            }),
        })
    }

    /// A built-in taking raw argument node lists, arity-checked by the
    /// callback itself.
    pub fn raw(
        args_signature: impl Into<String>,
        text_compatible: bool,
        callback: impl Fn(&mut Executor, &CallNode) -> Result<(), ExecError> + 'static,
    ) -> Rc<MacroBinding> {
        Rc::new(MacroBinding {
            args_signature: args_signature.into(),
            text_compatible,
            builtin: true,
            hooks: None,
            callback: Rc::new(callback),
        })
    }

    /// A built-in with a declared signature. The arity check and argument
    /// evaluation are generated from the signature: each parameter is
    /// evaluated to text unless prefixed with `*` (raw nodes), and a `?`
    /// suffix marks it optional. Optional parameters must be trailing.
    pub fn builtin(
        args_signature: &str,
        text_compatible: bool,
        callback: impl Fn(&mut Executor, &CallNode, &Args) -> Result<(), ExecError> + 'static,
    ) -> Rc<MacroBinding> {
        let params = Param::parse_signature(args_signature);
        let min_args = params.iter().filter(|param| !param.optional).count();
        let max_args = params.len();
        let args_signature = args_signature.to_string();
        let signature = args_signature.clone();
        Rc::new(MacroBinding {
            args_signature,
            text_compatible,
            builtin: true,
            hooks: None,
            callback: Rc::new(move |executor, call_node| {
                executor.check_argument_count(call_node, &signature, min_args, Some(max_args))?;
                let mut values = Vec::with_capacity(params.len());
                for (index, param) in params.iter().enumerate() {
                    let value = match call_node.args.get(index) {
                        None => Arg::Absent,
                        Some(nodes) if param.nodes => Arg::Nodes(nodes.clone()),
                        Some(nodes) => Arg::Text(executor.eval_text(nodes)?),
                    };
                    values.push(value);
                }
                callback(executor, call_node, &Args(values))
            }),
        })
    }
}

struct Param {
    nodes: bool,
    optional: bool,
}

impl Param {
    fn parse_signature(args_signature: &str) -> Vec<Param> {
        let mut params = Vec::new();
        if args_signature.is_empty() {
            return params;
        }
        let mut seen_optional = false;
        for name in args_signature.split(',') {
            let nodes = name.starts_with('*');
            let optional = name.ends_with('?');
            assert!(
                !seen_optional || optional,
                "required parameter after an optional one in signature: {args_signature}"
            );
            seen_optional = optional;
            params.push(Param { nodes, optional });
        }
        params
    }
}

/// One evaluated argument of a [`MacroBinding::builtin`] callback.
pub enum Arg {
    Text(String),
    Nodes(NodeList),
    Absent,
}

pub struct Args(pub Vec<Arg>);

impl Args {
    pub fn text(&self, index: usize) -> &str {
        match &self.0[index] {
            Arg::Text(text) => text,
            _ => panic!("parameter {index} is not declared as text"),
        }
    }

    pub fn nodes(&self, index: usize) -> &[Node] {
        match &self.0[index] {
            Arg::Nodes(nodes) => nodes,
            _ => panic!("parameter {index} is not declared as nodes"),
        }
    }

    pub fn opt_nodes(&self, index: usize) -> Option<&[Node]> {
        match &self.0[index] {
            Arg::Nodes(nodes) => Some(nodes),
            Arg::Absent => None,
            Arg::Text(_) => panic!("parameter {index} is not declared as nodes"),
        }
    }
}

pub struct ExecutionContext {
    parent: Option<Rc<ExecutionContext>>,
    macros: RefCell<MacroMap>,
}

impl ExecutionContext {
    pub fn new(parent: Option<Rc<ExecutionContext>>) -> Rc<ExecutionContext> {
        Rc::new(ExecutionContext {
            parent,
            macros: RefCell::new(MacroMap::new()),
        })
    }

    pub fn add_macro(&self, name: impl Into<String>, binding: Rc<MacroBinding>) {
        self.macros.borrow_mut().insert(name.into(), binding);
    }

    pub fn add_macros(&self, macros: &MacroMap) {
        let mut own = self.macros.borrow_mut();
        for (name, binding) in macros {
            own.insert(name.clone(), Rc::clone(binding));
        }
    }

    /// Replaces this context's own entries wholesale. Used when a branch
    /// switches typography.
    pub fn set_macros(&self, macros: MacroMap) {
        *self.macros.borrow_mut() = macros;
    }

    /// Finds a macro by name, innermost scope first. With `text_compatible`
    /// set, scopes holding only a text-incompatible binding of that name are
    /// skipped and the search continues outwards.
    pub fn lookup_macro(&self, name: &str, text_compatible: bool) -> Option<Rc<MacroBinding>> {
        if let Some(binding) = self.macros.borrow().get(name) {
            if !text_compatible || binding.text_compatible {
                return Some(Rc::clone(binding));
            }
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.lookup_macro(name, text_compatible))
    }
}
