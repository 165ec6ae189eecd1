//! Small utility macros.

use scribe::context::{MacroBinding, MacroMap};

pub(crate) fn register(macros: &mut MacroMap) {
    // Expands to nothing; handy as a separator after a macro name.
    macros.insert(
        "empty".to_string(),
        MacroBinding::builtin("", true, |_, _, _| Ok(())),
    );
    macros.insert(
        "eval.text".to_string(),
        MacroBinding::builtin("text", true, |executor, _, args| {
            executor.append_text(args.text(0))?;
            Ok(())
        }),
    );
    macros.insert(
        "log".to_string(),
        MacroBinding::builtin("message", true, |executor, _, args| {
            executor.logger.info(args.text(0));
            Ok(())
        }),
    );
}

#[cfg(test)]
mod tests {
    use scribe::{execution_test, execution_failure_test};

    execution_test!(empty_expands_to_nothing, crate::built_ins(), "a$empty", "a");

    execution_test!(
        eval_text_flattens_its_argument,
        crate::built_ins(),
        "$eval.text[a $case.upper[b] c]",
        "a B c"
    );

    execution_failure_test!(
        empty_rejects_extra_arguments,
        crate::built_ins(),
        "$empty[a][b]",
        "/root.psc:1: $empty: arguments count mismatch: expected 0, got 2"
    );

    execution_test!(log_appends_nothing, crate::built_ins(), "a$log[message]b", "ab");
}
