//! Source position tracking for diagnostics.
//!
//! Assembly is line oriented, so a position is a file name and a 1-based
//! line number. Column information lives in [`crate::error::ErrorContext`]
//! as a caret offset into the offending text.

use std::fmt;

/// A position in an assembly source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
}

impl SourcePos {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: file.to_string(),
            line,
        }
    }

    /// Position for text not tied to a file (tests, CLI definitions).
    pub fn internal() -> Self {
        Self::new("<internal>", 0)
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
