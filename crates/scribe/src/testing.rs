//! Test support: an in-memory file system and an execution harness.
//!
//! Shared by the engine's own tests and the standard library's; not part of
//! the stable API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::branch::BranchId;
use crate::context::MacroMap;
use crate::error::{ErrorFormat, FatalError, Logger};
use crate::executor::{Executor, FileSystem};

/// An in-memory [`FileSystem`]. Cloning shares the backing maps, so a test
/// can keep a handle to inspect files written by the executor.
#[derive(Clone, Default)]
pub struct FakeFileSystem {
    files: Rc<RefCell<HashMap<PathBuf, String>>>,
    written: Rc<RefCell<HashMap<PathBuf, Rc<RefCell<Vec<u8>>>>>>,
}

impl FakeFileSystem {
    pub fn new() -> FakeFileSystem {
        FakeFileSystem::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    /// The contents written to an output file so far, if it was opened.
    pub fn written_file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.written
            .borrow()
            .get(path.as_ref())
            .map(|buf| String::from_utf8_lossy(&buf.borrow()).into_owned())
    }
}

struct SharedWriter(Rc<RefCell<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn create_write(&mut self, path: &Path) -> io::Result<Box<dyn Write>> {
        let buf = Rc::new(RefCell::new(Vec::new()));
        self.written
            .borrow_mut()
            .insert(path.to_path_buf(), Rc::clone(&buf));
        Ok(Box::new(SharedWriter(buf)))
    }
}

/// An executor over a [`FakeFileSystem`], with the output directory at
/// `/output` and diagnostics discarded. The source under test runs as
/// `/root.psc`.
pub struct Harness {
    pub executor: Executor,
    pub fs: FakeFileSystem,
}

impl Harness {
    pub fn new(built_ins: MacroMap) -> Harness {
        let fs = FakeFileSystem::new();
        let logger = Logger::new(ErrorFormat::Simple, Rc::new(RefCell::new(io::sink())), None);
        let executor = Executor::new("/output", logger, Box::new(fs.clone()), built_ins);
        Harness { executor, fs }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.fs.add_file(path, contents);
    }

    pub fn run(&mut self, source: &str) -> Result<(), FatalError> {
        self.fs.add_file("/root.psc", source);
        self.executor
            .execute_file(Path::new("/root.psc"))
            .map_err(|e| e.into_fatal())
    }

    pub fn run_and_render(&mut self, source: &str) -> Result<(), FatalError> {
        self.run(source)?;
        self.executor.render_branches()
    }

    /// Renders the system branch, where output lands unless a branch macro
    /// redirected it.
    pub fn system_output(&mut self) -> String {
        self.render_branch(self.executor.system_branch)
    }

    pub fn branch_output(&mut self, name: &str) -> String {
        let id = self
            .executor
            .find_branch(name)
            .expect("the branch is registered");
        self.render_branch(id)
    }

    fn render_branch(&mut self, id: BranchId) -> String {
        let mut out = Vec::new();
        self.executor
            .render_branch_to(id, &mut out)
            .expect("the branch renders");
        String::from_utf8(out).expect("branch output is valid UTF-8")
    }

    /// The contents of a rendered output file.
    pub fn output_file(&self, path: &str) -> Option<String> {
        self.fs.written_file(path)
    }
}

/// Defines a test that runs a snippet and compares the system branch output.
#[macro_export]
macro_rules! execution_test {
    ($name:ident, $built_ins:expr, $input:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let mut harness = $crate::testing::Harness::new($built_ins);
            harness.run($input).unwrap();
            assert_eq!(harness.system_output(), $expected);
        }
    };
}

/// Defines a test that expects a snippet to fail, comparing the full error
/// rendering including the call stack.
#[macro_export]
macro_rules! execution_failure_test {
    ($name:ident, $built_ins:expr, $input:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let mut harness = $crate::testing::Harness::new($built_ins);
            let error = harness.run($input).unwrap_err();
            assert_eq!(error.to_string(), $expected);
        }
    };
}
