//! Source text provider with include nesting.
//!
//! The assembler pulls lines from the top of an include stack. INCLUDE
//! pushes a new source; end-of-file at nesting depth pops one level and
//! resumes the parent at its saved position; end-of-file at the top level
//! ends the phase.

use crate::types::MAX_INCLUDE_DEPTH;
use std::fs;

struct SourceLevel {
    name: String,
    lines: Vec<String>,
    pos: usize,
}

impl SourceLevel {
    fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: text
                .lines()
                .map(|l| l.trim_end_matches('\r').to_string())
                .collect(),
            pos: 0,
        }
    }
}

pub struct SourceStack {
    levels: Vec<SourceLevel>,
}

impl SourceStack {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            levels: vec![SourceLevel::new(name, text)],
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Push an include file read from disk. Errors: nesting too deep, or
    /// the file cannot be read.
    pub fn push_file(&mut self, path: &str) -> Result<(), String> {
        if self.levels.len() > MAX_INCLUDE_DEPTH {
            return Err(format!("Too many includes nested ( >= {})", MAX_INCLUDE_DEPTH));
        }
        let text = fs::read_to_string(path)
            .map_err(|_| format!("Could not open include file <{}>", path))?;
        self.levels.push(SourceLevel::new(path, &text));
        Ok(())
    }

    /// Push in-memory text; used by tests and nested assembly of
    /// generated sources.
    pub fn push_text(&mut self, name: &str, text: &str) -> Result<(), String> {
        if self.levels.len() > MAX_INCLUDE_DEPTH {
            return Err(format!("Too many includes nested ( >= {})", MAX_INCLUDE_DEPTH));
        }
        self.levels.push(SourceLevel::new(name, text));
        Ok(())
    }

    /// Name of the file currently being read.
    pub fn file(&self) -> &str {
        self.levels
            .last()
            .map(|l| l.name.as_str())
            .unwrap_or("<none>")
    }

    /// 1-based line number of the last line delivered from the current
    /// file.
    pub fn line(&self) -> u32 {
        self.levels.last().map(|l| l.pos as u32).unwrap_or(0)
    }

    /// Next line, popping finished includes. `None` means the root source
    /// is exhausted.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let level = self.levels.last_mut()?;
            if level.pos < level.lines.len() {
                let line = level.lines[level.pos].clone();
                level.pos += 1;
                return Some(line);
            }
            if self.levels.len() == 1 {
                return None;
            }
            if let Some(closed) = self.levels.pop() {
                log::debug!("closed include file {}", closed.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_numbers_per_level() {
        let mut stack = SourceStack::new("main.as9", "one\ntwo\n");
        assert_eq!(stack.next_line().as_deref(), Some("one"));
        assert_eq!(stack.line(), 1);
        stack.push_text("inc.as9", "alpha\r\nbeta").unwrap();
        assert_eq!(stack.next_line().as_deref(), Some("alpha"));
        assert_eq!(stack.file(), "inc.as9");
        assert_eq!(stack.line(), 1);
        assert_eq!(stack.next_line().as_deref(), Some("beta"));
        // include exhausted: resume the parent at its saved position
        assert_eq!(stack.next_line().as_deref(), Some("two"));
        assert_eq!(stack.file(), "main.as9");
        assert_eq!(stack.line(), 2);
        assert_eq!(stack.next_line(), None);
    }

    #[test]
    fn test_include_depth_limit() {
        let mut stack = SourceStack::new("main.as9", "");
        for i in 0..MAX_INCLUDE_DEPTH {
            stack.push_text(&format!("f{}", i), "").unwrap();
        }
        assert!(stack.push_text("too-deep", "").is_err());
    }
}
