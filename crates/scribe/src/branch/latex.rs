//! Special-character rebindings for LaTeX branches.
//!
//! A LaTeX branch is a text branch whose root context shadows the
//! special-character macros with their LaTeX escape sequences.

use crate::context::{MacroBinding, MacroMap};

pub(crate) fn latex_macros() -> MacroMap {
    let mut macros = MacroMap::new();
    for (name, text) in [
        ("text.percent", r"\%"),
        ("text.ampersand", r"\&"),
        ("text.underscore", r"\_"),
        ("text.dollar", r"\$"),
        ("text.hash", r"\#"),
        ("text.nbsp", "~"),
        ("text.softhyphen", r"\-"),
        ("text.dash.en", "--"),
        ("text.dash.em", "---"),
        ("text.ellipsis", r"\dots{}"),
    ] {
        macros.insert(name.to_string(), MacroBinding::append_text(text));
    }
    macros
}
