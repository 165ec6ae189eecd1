//! Macro definition: `macro.new` and its relatives.
//!
//! A user macro captures the call context active at its definition. Its
//! body executes in a child of that context holding one binding per
//! argument; each argument binding replays the caller's nodes in the
//! caller's own call context. Macros are dynamically scoped otherwise:
//! whatever `macro.new` defines lands in the current branch's context.

use std::rc::Rc;

use scribe::context::{ExecutionContext, HookFn, MacroBinding, MacroHooks, MacroMap};
use scribe::error::InternalError;
use scribe::executor::Executor;
use scribe::node::{CallNode, NodeList};
use scribe::parse::is_valid_macro_name;

pub(crate) fn register(macros: &mut MacroMap) {
    macros.insert(
        "macro.new".to_string(),
        MacroBinding::builtin("signature,*body", false, |executor, _, args| {
            let (name, arg_names) = parse_signature(args.text(0))?;
            let definition_context = Rc::clone(&executor.call_context);
            let binding = user_macro(definition_context, arg_names, args.nodes(1).to_vec());
            executor.current_branch_context().add_macro(name, binding);
            Ok(())
        }),
    );
    macros.insert(
        "macro.override".to_string(),
        MacroBinding::builtin("signature,original,*body", false, |executor, _, args| {
            let signature = args.text(0);
            let (name, arg_names) = parse_signature(signature)?;
            let original = args.text(1);
            if !is_valid_macro_name(original) {
                return Err(InternalError::new(format!(
                    "invalid original macro name: {original}"
                ))
                .into());
            }
            if arg_names.iter().any(|arg| arg == original) {
                return Err(InternalError::new(format!(
                    "original macro name conflicts with signature: {original} vs. {signature}"
                ))
                .into());
            }
            let overridden = lookup_non_builtin(executor, &name, "override")?;
            // The overridden macro stays reachable from the new body under
            // the given alias.
            let definition_context = ExecutionContext::new(Some(Rc::clone(&executor.call_context)));
            definition_context.add_macro(original, overridden);
            let binding = user_macro(definition_context, arg_names, args.nodes(2).to_vec());
            executor.current_branch_context().add_macro(name, binding);
            Ok(())
        }),
    );
    macros.insert(
        "macro.wrap".to_string(),
        MacroBinding::builtin("macro_name,*head,*tail", false, |executor, _, args| {
            let binding = lookup_non_builtin(executor, args.text(0), "wrap")?;
            let hooks = binding
                .hooks
                .as_ref()
                .expect("user macros always carry hook lists");
            // The newest wrapping runs outermost.
            hooks.head.borrow_mut().insert(
                0,
                hook(args.nodes(1).to_vec(), Rc::clone(&executor.call_context)),
            );
            hooks
                .tail
                .borrow_mut()
                .push(hook(args.nodes(2).to_vec(), Rc::clone(&executor.call_context)));
            Ok(())
        }),
    );
    macros.insert(
        "macro.call".to_string(),
        MacroBinding::raw("macro_name,arg1,...,argN", true, |executor, call_node| {
            executor.check_argument_count(call_node, "macro_name,arg1,...,argN", 1, None)?;
            let name_nodes = &call_node.args[0];
            let name = executor.eval_text(name_nodes)?;
            if name.is_empty() || name_nodes.is_empty() {
                return Err(InternalError::new("expected non-empty macro name").into());
            }
            let mut called = CallNode::new(name_nodes[0].location().clone(), name);
            called.args = call_node.args[1..].to_vec();
            executor.call_macro(&called)
        }),
    );
    macros.insert(
        "macro.context.new".to_string(),
        MacroBinding::builtin("*body", false, |executor, _, args| {
            let context = ExecutionContext::new(Some(executor.current_branch_context()));
            executor.execute_in_branch_context(args.nodes(0), context)
        }),
    );
}

/// Splits `name(arg1,arg2)` into the macro name and its argument names.
fn parse_signature(signature: &str) -> Result<(String, Vec<String>), InternalError> {
    let invalid = || InternalError::new(format!("invalid signature: {signature}"));
    let trimmed = signature.trim();
    let (name, inner) = match trimmed.split_once('(') {
        None => (trimmed, None),
        Some((name, rest)) => {
            let inner = rest.trim_end().strip_suffix(')').ok_or_else(invalid)?;
            (name.trim_end(), Some(inner.trim()))
        }
    };
    if !is_valid_macro_name(name) {
        return Err(invalid());
    }
    let mut arg_names = Vec::new();
    if let Some(inner) = inner.filter(|inner| !inner.is_empty()) {
        for arg in inner.split(',') {
            let arg = arg.trim();
            if !is_valid_macro_name(arg) {
                return Err(invalid());
            }
            if arg_names.iter().any(|existing| existing == arg) {
                return Err(InternalError::new(format!(
                    "duplicate argument in signature: {arg}"
                )));
            }
            arg_names.push(arg.to_string());
        }
    }
    Ok((name.to_string(), arg_names))
}

fn user_macro(
    definition_context: Rc<ExecutionContext>,
    arg_names: Vec<String>,
    body: NodeList,
) -> Rc<MacroBinding> {
    let hooks = MacroHooks::default();
    let callback_hooks = hooks.clone();
    let args_signature = arg_names.join(",");
    let signature = args_signature.clone();
    Rc::new(MacroBinding {
        args_signature,
        text_compatible: true,
        builtin: false,
        hooks: Some(hooks),
        callback: Rc::new(move |executor, call_node| {
            let expected = arg_names.len();
            executor.check_argument_count(call_node, &signature, expected, Some(expected))?;
            let arg_call_context = Rc::clone(&executor.call_context);
            let head: Vec<HookFn> = callback_hooks.head.borrow().clone();
            for hook in head {
                hook(executor)?;
            }
            let body_context = ExecutionContext::new(Some(Rc::clone(&definition_context)));
            for (arg_name, arg_nodes) in arg_names.iter().zip(&call_node.args) {
                body_context.add_macro(
                    arg_name.clone(),
                    MacroBinding::execute_nodes(
                        arg_nodes.clone(),
                        Some(Rc::clone(&arg_call_context)),
                    ),
                );
            }
            executor.execute_in_call_context(&body, Some(body_context))?;
            let tail: Vec<HookFn> = callback_hooks.tail.borrow().clone();
            for hook in tail {
                hook(executor)?;
            }
            Ok(())
        }),
    })
}

fn lookup_non_builtin(
    executor: &Executor,
    name: &str,
    verb: &str,
) -> Result<Rc<MacroBinding>, InternalError> {
    let binding = executor.lookup_macro(name, false).ok_or_else(|| {
        InternalError::new(format!("cannot {verb} a non-existing macro: {name}"))
    })?;
    if binding.builtin {
        return Err(InternalError::new(format!(
            "cannot {verb} a built-in macro: {name}"
        )));
    }
    Ok(binding)
}

fn hook(nodes: NodeList, call_context: Rc<ExecutionContext>) -> HookFn {
    Rc::new(move |executor| {
        executor.execute_in_call_context(&nodes, Some(Rc::clone(&call_context)))
    })
}

#[cfg(test)]
mod tests {
    use scribe::testing::Harness;
    use scribe::{execution_failure_test, execution_test};

    execution_test!(
        defines_and_calls_a_macro,
        crate::built_ins(),
        "$macro.new[hi(name)][Hello, $name!]$hi[world]",
        "Hello, world!"
    );

    execution_test!(
        macros_see_macros_defined_before_them,
        crate::built_ins(),
        "$macro.new[a][x]$macro.new[b][$a$a]$b",
        "xx"
    );

    execution_test!(
        body_context_captures_the_defining_call_context,
        crate::built_ins(),
        "$macro.new[outer(x)][$macro.new[inner(y)][$x $y]]$outer[1]$inner[2]",
        "1 2"
    );

    execution_test!(
        empty_parenthesized_signature,
        crate::built_ins(),
        "$macro.new[f()][ok]$f",
        "ok"
    );

    execution_failure_test!(
        invalid_signature,
        crate::built_ins(),
        "$macro.new[not a name][x]",
        "/root.psc:1: $macro.new: invalid signature: not a name"
    );

    execution_failure_test!(
        duplicate_argument_name,
        crate::built_ins(),
        "$macro.new[f(a,a)][x]",
        "/root.psc:1: $macro.new: duplicate argument in signature: a"
    );

    execution_failure_test!(
        user_macro_arity_is_exact,
        crate::built_ins(),
        "$macro.new[hi(name)][Hello $name]$hi",
        "/root.psc:1: $hi(name): arguments count mismatch: expected 1, got 0"
    );

    execution_failure_test!(
        errors_in_a_body_carry_the_call_stack,
        crate::built_ins(),
        "$macro.new[boom][$nope]$boom",
        "/root.psc:1: macro not found: $nope\n  /root.psc:1: $boom"
    );

    #[test]
    fn runaway_user_macro_recursion_is_cut_off() {
        let mut harness = Harness::new(crate::built_ins());
        let err = harness.run("$macro.new[deeper][$deeper]$deeper").unwrap_err();
        assert_eq!(err.message, "$deeper: too many nested macro calls");
    }

    execution_test!(
        override_keeps_the_original_reachable,
        crate::built_ins(),
        "$macro.new[greet][hi]$macro.override[greet][old][$old $old]$greet",
        "hi hi"
    );

    execution_failure_test!(
        cannot_override_a_missing_macro,
        crate::built_ins(),
        "$macro.override[ghost][old][x]",
        "/root.psc:1: $macro.override: cannot override a non-existing macro: ghost"
    );

    execution_failure_test!(
        cannot_override_a_builtin,
        crate::built_ins(),
        "$macro.override[empty][old][x]",
        "/root.psc:1: $macro.override: cannot override a built-in macro: empty"
    );

    execution_failure_test!(
        original_alias_must_not_shadow_an_argument,
        crate::built_ins(),
        "$macro.new[f(a)][$a]$macro.override[f(a)][a][$a]",
        "/root.psc:1: $macro.override: \
         original macro name conflicts with signature: a vs. f(a)"
    );

    execution_test!(
        wrap_runs_head_and_tail_around_the_body,
        crate::built_ins(),
        "$macro.new[m][body]$macro.wrap[m][<][>]$m",
        "<body>"
    );

    execution_test!(
        later_wrappings_run_outermost,
        crate::built_ins(),
        "$macro.new[m][c]$macro.wrap[m][a][b]$macro.wrap[m][x][y]$m",
        "xacby"
    );

    execution_failure_test!(
        cannot_wrap_a_builtin,
        crate::built_ins(),
        "$macro.wrap[empty][a][b]",
        "/root.psc:1: $macro.wrap: cannot wrap a built-in macro: empty"
    );

    execution_test!(
        call_by_computed_name,
        crate::built_ins(),
        "$macro.call[case.upper][abc]",
        "ABC"
    );

    execution_test!(
        call_forwards_the_remaining_arguments,
        crate::built_ins(),
        "$macro.new[greet(name)][hi $name]$macro.call[greet][bob]",
        "hi bob"
    );

    execution_failure_test!(
        call_rejects_an_empty_name,
        crate::built_ins(),
        "$macro.call[$empty]",
        "/root.psc:1: $macro.call: expected non-empty macro name"
    );

    execution_test!(
        context_new_scopes_definitions,
        crate::built_ins(),
        "$macro.context.new[$macro.new[tmp][x]$tmp]$if.def[tmp][defined][gone]",
        "xgone"
    );
}
