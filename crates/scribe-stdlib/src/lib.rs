//! The standard macro library: macro definition, branch manipulation,
//! conditionals, counters, text formatting and file inclusion.
//!
//! [`built_ins`] assembles the full macro map, ready to be installed into
//! the system branch context of a new executor.

use scribe::context::MacroMap;
use scribe::error::InternalError;

mod branching;
mod conditional;
mod counter;
mod input;
mod macrodef;
mod misc;
mod textfmt;

pub fn built_ins() -> MacroMap {
    let mut macros = scribe::special::special_characters();
    misc::register(&mut macros);
    macrodef::register(&mut macros);
    branching::register(&mut macros);
    conditional::register(&mut macros);
    counter::register(&mut macros);
    textfmt::register(&mut macros);
    input::register(&mut macros);
    macros
}

/// Parses a signed decimal integer, tolerating surrounding whitespace.
pub(crate) fn parse_int(text: &str) -> Result<i64, InternalError> {
    text.trim()
        .parse()
        .map_err(|_| InternalError::new(format!("invalid integer value: {text}")))
}
