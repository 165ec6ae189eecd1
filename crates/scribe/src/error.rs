//! Error types and diagnostics output.
//!
//! Two levels of errors exist. [`InternalError`] is a bare message raised
//! deep inside the engine or a macro callback, where no location is known.
//! [`FatalError`] is what execution ultimately returns: a message with the
//! location of the offending node and the macro call stack at the point of
//! failure, most recent call first. The executor converts internal errors
//! into fatal ones as they cross a node boundary.

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use colored::Colorize;

use crate::node::Location;

/// An error with no location information attached yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> InternalError {
        InternalError {
            message: message.into(),
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One entry of the macro call stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallFrame {
    pub location: Location,
    pub name: String,
}

/// An error that aborts execution.
#[derive(Clone, Debug, PartialEq)]
pub struct FatalError {
    /// Location of the node whose evaluation failed, if known.
    pub location: Option<Location>,
    pub message: String,
    /// Macro calls in progress, most recent first.
    pub call_stack: Vec<CallFrame>,
}

impl FatalError {
    pub fn message_only(message: impl Into<String>) -> FatalError {
        FatalError {
            location: None,
            message: message.into(),
            call_stack: Vec::new(),
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.message)?,
            None => f.write_str(&self.message)?,
        }
        for frame in &self.call_stack {
            write!(f, "\n  {}: ${}", frame.location, frame.name)?;
        }
        Ok(())
    }
}

/// Either level of error, for propagation with `?`.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecError {
    Internal(InternalError),
    Fatal(FatalError),
}

impl ExecError {
    /// Finishes the conversion: an internal error that reached the top level
    /// becomes a fatal error with no location.
    pub fn into_fatal(self) -> FatalError {
        match self {
            ExecError::Internal(error) => FatalError::message_only(error.message),
            ExecError::Fatal(error) => error,
        }
    }
}

impl From<InternalError> for ExecError {
    fn from(error: InternalError) -> ExecError {
        ExecError::Internal(error)
    }
}

impl From<FatalError> for ExecError {
    fn from(error: FatalError) -> ExecError {
        ExecError::Fatal(error)
    }
}

/// How [`Logger::report`] renders a fatal error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorFormat {
    /// `file:line: message` plus one indented line per stack frame.
    Simple,
    /// Python-traceback lookalike, convenient for editors that parse it.
    Python,
}

/// Sink for diagnostics and progress messages.
pub struct Logger {
    format: ErrorFormat,
    err: Rc<RefCell<dyn Write>>,
    /// Progress messages; `None` silences them.
    info: Option<Rc<RefCell<dyn Write>>>,
}

impl Clone for Logger {
    fn clone(&self) -> Logger {
        Logger {
            format: self.format,
            err: Rc::clone(&self.err),
            info: self.info.as_ref().map(Rc::clone),
        }
    }
}

impl Logger {
    pub fn new(
        format: ErrorFormat,
        err: Rc<RefCell<dyn Write>>,
        info: Option<Rc<RefCell<dyn Write>>>,
    ) -> Logger {
        Logger { format, err, info }
    }

    /// A logger writing to standard error streams.
    pub fn stderr(format: ErrorFormat, quiet: bool) -> Logger {
        let err: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(std::io::stderr()));
        let info = if quiet {
            None
        } else {
            Some(Rc::clone(&err))
        };
        Logger { format, err, info }
    }

    pub fn info(&self, message: &str) {
        if let Some(writer) = &self.info {
            let _ = writeln!(writer.borrow_mut(), "{message}");
        }
    }

    pub fn report(&self, error: &FatalError) {
        let mut writer = self.err.borrow_mut();
        let _ = match self.format {
            ErrorFormat::Simple => Self::write_simple(&mut *writer, error),
            ErrorFormat::Python => Self::write_python(&mut *writer, error),
        };
    }

    fn write_simple(writer: &mut dyn Write, error: &FatalError) -> std::io::Result<()> {
        match &error.location {
            Some(location) => writeln!(writer, "{}: {}", location, error.message.red())?,
            None => writeln!(writer, "{}", error.message.red())?,
        }
        for frame in &error.call_stack {
            writeln!(writer, "  {}: ${}", frame.location, frame.name)?;
        }
        Ok(())
    }

    fn write_python(writer: &mut dyn Write, error: &FatalError) -> std::io::Result<()> {
        match &error.location {
            Some(location) => {
                writeln!(writer, "  File \"{}\", line {}", location.source, location.line)?;
                writeln!(writer, "    {}", error.message.red())?;
            }
            None => writeln!(writer, "    {}", error.message.red())?,
        }
        for frame in &error.call_stack {
            writeln!(
                writer,
                "  File \"{}\", line {}, in ${}",
                frame.location.source, frame.location.line, frame.name
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SourceName;

    fn location(line: u32) -> Location {
        Location::new(&SourceName::new("book.psc", ""), line)
    }

    #[test]
    fn fatal_error_display_without_location() {
        let error = FatalError::message_only("branch not found: main");
        assert_eq!(error.to_string(), "branch not found: main");
    }

    #[test]
    fn fatal_error_display_with_stack() {
        let error = FatalError {
            location: Some(location(3)),
            message: "$inner: oops".into(),
            call_stack: vec![
                CallFrame {
                    location: location(7),
                    name: "inner".into(),
                },
                CallFrame {
                    location: location(9),
                    name: "outer".into(),
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "book.psc:3: $inner: oops\n  book.psc:7: $inner\n  book.psc:9: $outer"
        );
    }

    #[test]
    fn internal_error_becomes_fatal_without_location() {
        let error: ExecError = InternalError::new("bad state").into();
        assert_eq!(error.into_fatal(), FatalError::message_only("bad state"));
    }
}
