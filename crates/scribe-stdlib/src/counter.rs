//! Named counters.
//!
//! `counter.create` registers a family of macros sharing one value:
//! `$name` reads it, `$name.set` and `$name.incr` change it, and
//! `$name.if.positive` guards its contents on the value.

use std::cell::Cell;
use std::rc::Rc;

use scribe::context::{MacroBinding, MacroMap};

use crate::parse_int;

pub(crate) fn register(macros: &mut MacroMap) {
    macros.insert(
        "counter.create".to_string(),
        MacroBinding::builtin("counter_name", false, |executor, _, args| {
            let name = args.text(0);
            let value = Rc::new(Cell::new(0i64));
            let context = executor.current_branch_context();
            let reader = Rc::clone(&value);
            context.add_macro(
                name,
                MacroBinding::builtin("", true, move |executor, _, _| {
                    executor.append_text(&reader.get().to_string())?;
                    Ok(())
                }),
            );
            let guard = Rc::clone(&value);
            context.add_macro(
                format!("{name}.if.positive"),
                MacroBinding::builtin("*contents", true, move |executor, _, args| {
                    if guard.get() > 0 {
                        executor.execute_nodes(args.nodes(0))?;
                    }
                    Ok(())
                }),
            );
            let setter = Rc::clone(&value);
            context.add_macro(
                format!("{name}.set"),
                MacroBinding::builtin("value", false, move |_, _, args| {
                    setter.set(parse_int(args.text(0))?);
                    Ok(())
                }),
            );
            context.add_macro(
                format!("{name}.incr"),
                MacroBinding::builtin("", false, move |_, _, _| {
                    value.set(value.get() + 1);
                    Ok(())
                }),
            );
            Ok(())
        }),
    );
}
