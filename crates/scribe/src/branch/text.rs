//! The plain-text branch.

use crate::branch::BranchId;

/// Accumulated output of a text branch: text runs interleaved with
/// sub-branch splice points, rendered by concatenation.
#[derive(Debug, Default)]
pub struct TextBranch {
    pub(crate) outputs: Vec<TextOutput>,
    accu: String,
}

#[derive(Debug)]
pub(crate) enum TextOutput {
    Text(String),
    Sub(BranchId),
}

impl TextBranch {
    pub fn new() -> TextBranch {
        TextBranch::default()
    }

    pub fn append_text(&mut self, text: &str) {
        self.accu.push_str(text);
    }

    pub(crate) fn append_sub(&mut self, sub: BranchId) {
        self.flush();
        self.outputs.push(TextOutput::Sub(sub));
    }

    pub(crate) fn flush(&mut self) {
        if !self.accu.is_empty() {
            self.outputs.push(TextOutput::Text(std::mem::take(&mut self.accu)));
        }
    }
}
