//! Conditional execution and repetition.

use scribe::context::{MacroBinding, MacroMap};

use crate::parse_int;

pub(crate) fn register(macros: &mut MacroMap) {
    macros.insert(
        "if.def".to_string(),
        MacroBinding::builtin(
            "macro_name,*then_block,*else_block?",
            true,
            |executor, _, args| {
                if executor.lookup_macro(args.text(0), false).is_some() {
                    executor.execute_nodes(args.nodes(1))
                } else if let Some(else_block) = args.opt_nodes(2) {
                    executor.execute_nodes(else_block)
                } else {
                    Ok(())
                }
            },
        ),
    );
    macros.insert(
        "if.eq".to_string(),
        MacroBinding::builtin(
            "left,right,*then_block,*else_block?",
            true,
            |executor, _, args| {
                if args.text(0) == args.text(1) {
                    executor.execute_nodes(args.nodes(2))
                } else if let Some(else_block) = args.opt_nodes(3) {
                    executor.execute_nodes(else_block)
                } else {
                    Ok(())
                }
            },
        ),
    );
    macros.insert(
        "repeat".to_string(),
        MacroBinding::builtin("count,*contents", true, |executor, _, args| {
            let count = parse_int(args.text(0))?;
            for _ in 0..count.max(0) {
                executor.execute_nodes(args.nodes(1))?;
            }
            Ok(())
        }),
    );
}

#[cfg(test)]
mod tests {
    use scribe::{execution_failure_test, execution_test};

    execution_test!(
        if_def_takes_the_then_block,
        crate::built_ins(),
        "$if.def[text.percent][yes][no]",
        "yes"
    );

    execution_test!(
        if_def_takes_the_else_block,
        crate::built_ins(),
        "$if.def[no.such.macro][yes][no]",
        "no"
    );

    execution_test!(
        if_def_without_else_expands_to_nothing,
        crate::built_ins(),
        "a$if.def[no.such.macro][yes]b",
        "ab"
    );

    execution_test!(
        if_eq_compares_evaluated_text,
        crate::built_ins(),
        "$if.eq[$case.upper[a]][A][same][different]",
        "same"
    );

    execution_test!(
        if_eq_takes_the_else_block,
        crate::built_ins(),
        "$if.eq[a][b][same][different]",
        "different"
    );

    execution_test!(
        repeat_executes_its_contents,
        crate::built_ins(),
        "$repeat[3][ab]",
        "ababab"
    );

    execution_test!(
        repeat_with_a_negative_count,
        crate::built_ins(),
        "x$repeat[-2][a]y",
        "xy"
    );

    execution_failure_test!(
        repeat_rejects_non_integers,
        crate::built_ins(),
        "$repeat[x][a]",
        "/root.psc:1: $repeat: invalid integer value: x"
    );
}
