//! Scribe is a macro-expansion document compiler.
//!
//! An input document is a tree of text and macro-call nodes produced by
//! [`parse`]. The [`executor`](executor::Executor) walks this tree once,
//! resolving macro names through chains of [execution
//! contexts](context::ExecutionContext) and streaming the expanded output
//! into [branches](branch): append-only output trees that are rendered to
//! plain text, LaTeX or XHTML when execution is over.
//!
//! The built-in macro library lives in the `scribe-stdlib` crate; this crate
//! contains the engine, the concrete branch types, and the macros that only
//! make sense inside an HTML branch.

pub mod branch;
pub mod context;
pub mod error;
pub mod executor;
pub mod html;
pub mod node;
pub mod parse;
pub mod special;
pub mod testing;
pub mod typography;
pub mod xml;
