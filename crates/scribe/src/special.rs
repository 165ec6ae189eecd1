//! The special-character macros.
//!
//! These live in the core crate because the neutral typography and the LaTeX
//! branch both rebind subsets of them; the standard library re-exports the
//! full map as part of its built-ins.

use crate::context::{MacroBinding, MacroMap};
use crate::node::CallNode;

/// All special-character macros, bound to their literal output.
pub fn special_characters() -> MacroMap {
    let mut macros = MacroMap::new();
    for (name, text) in [
        ("text.percent", "%"),
        ("text.ampersand", "&"),
        ("text.backslash", "\\"),
        ("text.caret", "^"),
        ("text.underscore", "_"),
        ("text.dollar", "$"),
        ("text.hash", "#"),
        ("text.nbsp", "\u{a0}"),
        ("text.softhyphen", "\u{ad}"),
        ("text.dash.en", "–"),
        ("text.dash.em", "—"),
        ("text.ellipsis", "…"),
        ("text.guillemet.open", "«"),
        ("text.guillemet.close", "»"),
        ("text.backtick", "`"),
        ("text.apostrophe", "'"),
        ("text.quote.open", "“"),
        ("text.quote.close", "”"),
        ("newline", "\n"),
    ] {
        macros.insert(name.to_string(), MacroBinding::append_text(text));
    }
    macros.insert(
        "text.punctuation.double".to_string(),
        MacroBinding::builtin("contents", true, |executor, _, args| {
            executor.append_text(args.text(0))?;
            Ok(())
        }),
    );
    // `$-` is an alias resolved through the context chain, so typographies
    // can rebind `text.softhyphen` and the alias follows.
    macros.insert(
        "-".to_string(),
        MacroBinding::raw("", true, |executor, call_node| {
            let called = CallNode::new(call_node.location.clone(), "text.softhyphen");
            executor.call_macro(&called)
        }),
    );
    macros
}
