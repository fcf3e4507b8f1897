//! Error handling for the asm9 cross-assembler.
//!
//! Every fatal condition carries enough context to reproduce the classic
//! error report: the offending source line, a caret under the offending
//! column, and the active file name and line number. The assembler has no
//! error-recovery mode; errors propagate out and stop the run.

use crate::source_pos::SourcePos;
use std::fmt;
use thiserror::Error;

/// Context attached to a diagnostic: where it happened and what the
/// offending text looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub pos: SourcePos,
    /// The source line (or extracted operand text) the caret refers to.
    pub text: String,
    /// Byte offset of the error within `text`, when determinable.
    pub caret: Option<usize>,
}

impl ErrorContext {
    pub fn new(pos: SourcePos, text: &str) -> Self {
        Self {
            pos,
            text: text.to_string(),
            caret: None,
        }
    }

    pub fn with_caret(pos: SourcePos, text: &str, caret: usize) -> Self {
        Self {
            pos,
            text: text.to_string(),
            caret: Some(caret),
        }
    }

    /// Render the line-and-caret block shown below an error message.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.text);
        out.push('\n');
        if let Some(col) = self.caret {
            if col < 80 {
                for _ in 0..col {
                    out.push(' ');
                }
                out.push_str("^\n");
            }
        }
        out
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pos)
    }
}

/// Main assembler error type covering all failure classes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsmError {
    #[error("Syntax error at {context}: {message}")]
    Syntax {
        context: ErrorContext,
        message: String,
    },

    #[error("Symbol error at {context}: {message}")]
    Symbol {
        context: ErrorContext,
        message: String,
    },

    #[error("Encoding error at {context}: {message}")]
    Encoding {
        context: ErrorContext,
        message: String,
    },

    #[error("Structural error at {context}: {message}")]
    Structural {
        context: ErrorContext,
        message: String,
    },

    #[error("Phase error at {context}: {message}")]
    Phase {
        context: ErrorContext,
        message: String,
    },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl AsmError {
    pub fn syntax(message: impl Into<String>, context: ErrorContext) -> Self {
        AsmError::Syntax {
            context,
            message: message.into(),
        }
    }

    pub fn symbol(message: impl Into<String>, context: ErrorContext) -> Self {
        AsmError::Symbol {
            context,
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>, context: ErrorContext) -> Self {
        AsmError::Encoding {
            context,
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>, context: ErrorContext) -> Self {
        AsmError::Structural {
            context,
            message: message.into(),
        }
    }

    pub fn phase(message: impl Into<String>, context: ErrorContext) -> Self {
        AsmError::Phase {
            context,
            message: message.into(),
        }
    }

    /// The attached context, if the error carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            AsmError::Syntax { context, .. }
            | AsmError::Symbol { context, .. }
            | AsmError::Encoding { context, .. }
            | AsmError::Structural { context, .. }
            | AsmError::Phase { context, .. } => Some(context),
            AsmError::Io { .. } => None,
        }
    }

    /// Full report: message plus the line-and-caret block.
    pub fn report(&self) -> String {
        match self.context() {
            Some(ctx) => format!("{}\n{}", self, ctx.render()),
            None => format!("{}", self),
        }
    }
}

impl From<std::io::Error> for AsmError {
    fn from(err: std::io::Error) -> Self {
        AsmError::Io {
            message: err.to_string(),
        }
    }
}

/// Collects reported errors against a configurable maximum.
///
/// Most errors abort assembly immediately; the reporter exists for the few
/// conditions that report and continue (the undefined-symbol sweep, program
/// counter overflow in phase 2) and to derive the process exit status.
pub struct ErrorReporter {
    errors: Vec<AsmError>,
    max_errors: usize,
}

impl ErrorReporter {
    pub fn new(max_errors: usize) -> Self {
        Self {
            errors: Vec::new(),
            max_errors,
        }
    }

    pub fn report(&mut self, error: AsmError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// True once the configured maximum has been reached; phase 2 aborts
    /// early when this trips.
    pub fn at_limit(&self) -> bool {
        self.errors.len() >= self.max_errors
    }

    pub fn errors(&self) -> &[AsmError] {
        &self.errors
    }

    pub fn summary(&self) -> String {
        match self.errors.len() {
            0 => "no errors".to_string(),
            1 => "1 error".to_string(),
            n => format!("{} errors", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ErrorContext {
        ErrorContext::with_caret(SourcePos::new("test.as9", 3), "LDA #Q!", 6)
    }

    #[test]
    fn test_error_display() {
        let err = AsmError::syntax("binary operator expected", ctx());
        let text = format!("{}", err);
        assert!(text.contains("test.as9:3"));
        assert!(text.contains("binary operator expected"));
    }

    #[test]
    fn test_caret_render() {
        let rendered = ctx().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "LDA #Q!");
        assert_eq!(lines[1], "      ^");
    }

    #[test]
    fn test_caret_suppressed_past_column_80() {
        let far = ErrorContext::with_caret(SourcePos::internal(), "x", 120);
        assert!(!far.render().contains('^'));
    }

    #[test]
    fn test_reporter_limit() {
        let mut reporter = ErrorReporter::new(2);
        assert!(!reporter.has_errors());
        reporter.report(AsmError::syntax("one", ctx()));
        assert!(!reporter.at_limit());
        reporter.report(AsmError::syntax("two", ctx()));
        assert!(reporter.at_limit());
        assert_eq!(reporter.summary(), "2 errors");
    }

    #[test]
    fn test_io_error_has_no_context() {
        let err: AsmError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.context().is_none());
        assert!(err.report().contains("gone"));
    }
}
