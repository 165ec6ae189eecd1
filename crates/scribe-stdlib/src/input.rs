//! File inclusion macros.

use std::path::Path;

use scribe::context::{MacroBinding, MacroMap};
use scribe::error::{ExecError, InternalError};
use scribe::executor::SCRIBE_EXT;

pub(crate) fn register(macros: &mut MacroMap) {
    // Relative paths resolve against the directory of the including file.
    macros.insert(
        "include".to_string(),
        MacroBinding::builtin("path", false, |executor, call_node, args| {
            let path = args.text(0);
            let resolved = executor.resolve_file_path(
                Path::new(path),
                &call_node.location.source.dir_path,
                Some(SCRIBE_EXT),
            );
            match executor.execute_file(&resolved) {
                Err(ExecError::Internal(e)) => Err(InternalError::new(format!(
                    "unable to include \"{path}\": {}",
                    e.message
                ))
                .into()),
                other => other,
            }
        }),
    );
    macros.insert(
        "include.text".to_string(),
        MacroBinding::builtin("path", true, |executor, call_node, args| {
            let path = args.text(0);
            let resolved = executor.resolve_file_path(
                Path::new(path),
                &call_node.location.source.dir_path,
                None,
            );
            let contents = executor
                .read_text_file(&resolved)
                .map_err(|e| InternalError::new(format!("unable to include \"{path}\": {e}")))?;
            executor.append_text(&contents)?;
            Ok(())
        }),
    );
}

#[cfg(test)]
mod tests {
    use scribe::testing::Harness;
    use scribe::{execution_failure_test, execution_test};

    #[test]
    fn include_resolves_and_executes_a_file() {
        let mut harness = Harness::new(crate::built_ins());
        harness.add_file("/chapter.psc", "$case.upper[included]");
        harness.run("a $include[chapter] b").unwrap();
        assert_eq!(harness.system_output(), "a INCLUDED b");
    }

    #[test]
    fn include_resolves_against_the_including_file() {
        let mut harness = Harness::new(crate::built_ins());
        harness.add_file("/part/one.psc", "$include[two]");
        harness.add_file("/part/two.psc", "deep");
        harness.run("$include[part/one]").unwrap();
        assert_eq!(harness.system_output(), "deep");
    }

    execution_failure_test!(
        include_reports_the_requested_path,
        crate::built_ins(),
        "$include[missing]",
        "/root.psc:1: $include: unable to include \"missing\": \
         unable to read the input file: /missing.psc"
    );

    #[test]
    fn include_text_appends_the_file_verbatim() {
        let mut harness = Harness::new(crate::built_ins());
        harness.add_file("/raw.txt", "$not.a.macro # nor a comment");
        harness.run("$include.text[raw.txt]").unwrap();
        assert_eq!(harness.system_output(), "$not.a.macro # nor a comment");
    }

    execution_failure_test!(
        include_text_requires_the_file,
        crate::built_ins(),
        "$include.text[missing.txt]",
        "/root.psc:1: $include.text: unable to include \"missing.txt\": no such file"
    );

    #[test]
    fn errors_in_included_files_point_at_them() {
        let mut harness = Harness::new(crate::built_ins());
        harness.add_file("/chapter.psc", "$nope");
        let err = harness.run("$include[chapter]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "/chapter.psc:1: macro not found: $nope\n  /root.psc:1: $include"
        );
    }
}
