//! Macro recording and expansion.
//!
//! A macro body is stored as a structured template: each line is a list of
//! literal-text and parameter-index pieces, so expansion is a plain
//! substitution pass with no marker byte to collide with. Expansion pushes
//! the substituted lines onto a stack drained one line at a time ahead of
//! the include stack; a body invoking another macro simply pushes another
//! frame, which is all the nesting support there is. Self-recursive macros
//! are not guarded against.

use crate::types::MAX_MACRO_ARGS;
use std::collections::{HashMap, VecDeque};

/// Definition syntax, which also selects the call-site argument style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroStyle {
    /// `MACRO Name(a,b)` — call site uses parentheses.
    Call,
    /// `Name MACRO a,b` — call site uses bare comma/space separated args.
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroPiece {
    Text(String),
    Arg(usize),
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub params: usize,
    pub style: MacroStyle,
    pub body: Vec<Vec<MacroPiece>>,
}

impl MacroDef {
    /// Substitute arguments into the body, producing the expansion lines.
    pub fn expand(&self, args: &[String]) -> Vec<String> {
        self.body
            .iter()
            .map(|line| {
                let mut out = String::new();
                for piece in line {
                    match piece {
                        MacroPiece::Text(t) => out.push_str(t),
                        MacroPiece::Arg(i) => {
                            if let Some(arg) = args.get(*i) {
                                out.push_str(arg);
                            }
                        }
                    }
                }
                out
            })
            .collect()
    }
}

/// Compile one raw body line against the parameter names. Occurrences are
/// matched textually in parameter order with no word-boundary test.
pub fn compile_body_line(line: &str, params: &[String]) -> Vec<MacroPiece> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut rest = line;

    'outer: while !rest.is_empty() {
        for (i, param) in params.iter().enumerate() {
            if !param.is_empty() && rest.starts_with(param.as_str()) {
                if !text.is_empty() {
                    pieces.push(MacroPiece::Text(std::mem::take(&mut text)));
                }
                pieces.push(MacroPiece::Arg(i));
                rest = &rest[param.len()..];
                continue 'outer;
            }
        }
        let c = rest.chars().next().unwrap();
        text.push(c);
        rest = &rest[c.len_utf8()..];
    }
    if !text.is_empty() {
        pieces.push(MacroPiece::Text(text));
    }
    pieces
}

pub struct MacroTable {
    macros: Vec<MacroDef>,
    index: HashMap<String, Vec<usize>>,
    pub ignore_case: bool,
}

impl MacroTable {
    pub fn new(ignore_case: bool) -> Self {
        Self {
            macros: Vec::new(),
            index: HashMap::new(),
            ignore_case,
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        let candidates = self.index.get(&name.to_ascii_uppercase())?;
        if self.ignore_case {
            candidates.first().copied()
        } else {
            candidates
                .iter()
                .copied()
                .find(|&i| self.macros[i].name == name)
        }
    }

    pub fn insert(&mut self, def: MacroDef) -> usize {
        let idx = self.macros.len();
        self.index
            .entry(def.name.to_ascii_uppercase())
            .or_default()
            .push(idx);
        self.macros.push(def);
        idx
    }

    pub fn get(&self, idx: usize) -> &MacroDef {
        &self.macros[idx]
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// Stack of in-flight expansions. Lines are delivered innermost first;
/// exhausted frames pop transparently.
#[derive(Debug, Default)]
pub struct MacroStack {
    frames: Vec<VecDeque<String>>,
}

impl MacroStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lines: Vec<String>) {
        self.frames.push(lines.into());
    }

    pub fn active(&self) -> bool {
        self.frames.iter().any(|f| !f.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(line) = frame.pop_front() {
                return Some(line);
            }
            self.frames.pop();
        }
    }
}

/// Scan a call-site argument: raw text up to a comma or closing
/// parenthesis, surrounding blanks trimmed.
pub fn scan_macro_arg(text: &str) -> (String, &str) {
    let rest = text.trim_start();
    let end = rest.find([',', ')']).unwrap_or(rest.len());
    (rest[..end].trim_end().to_string(), &rest[end..])
}

/// Parse the call-site argument list. `expected` bounds the scan; fewer
/// arguments than declared is the caller's error to raise.
pub fn scan_call_args(text: &str, expected: usize) -> Vec<String> {
    let mut args = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() && args.len() < expected.min(MAX_MACRO_ARGS) {
        if rest.starts_with(')') {
            break;
        }
        let (arg, r) = scan_macro_arg(rest);
        args.push(arg);
        rest = r.trim_start();
        if rest.starts_with(')') {
            break;
        }
        if let Some(r) = rest.strip_prefix(',') {
            rest = r;
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compile_and_expand() {
        let p = params(&["Message"]);
        let def = MacroDef {
            name: "PrintString".to_string(),
            params: 1,
            style: MacroStyle::Call,
            body: vec![
                compile_body_line("   LDX   #Message", &p),
                compile_body_line("   LDB   #?Message", &p),
            ],
        };
        let lines = def.expand(&["OK".to_string()]);
        assert_eq!(lines[0], "   LDX   #OK");
        assert_eq!(lines[1], "   LDB   #?OK");
    }

    #[test]
    fn test_substitution_has_no_word_boundary() {
        // Matching is plain text search in parameter order: a parameter
        // name occurring inside a longer word is still substituted.
        let p = params(&["X"]);
        let pieces = compile_body_line("LDX #X", &p);
        assert_eq!(
            pieces,
            vec![
                MacroPiece::Text("LD".to_string()),
                MacroPiece::Arg(0),
                MacroPiece::Text(" #".to_string()),
                MacroPiece::Arg(0),
            ]
        );
    }

    #[test]
    fn test_scan_call_args() {
        assert_eq!(scan_call_args("5)", 1), vec!["5"]);
        assert_eq!(scan_call_args("a, b+1)", 2), vec!["a", "b+1"]);
        assert_eq!(scan_call_args("#$20, Buffer", 2), vec!["#$20", "Buffer"]);
        // extra arguments beyond the declared count are ignored
        assert_eq!(scan_call_args("1,2,3", 2), vec!["1", "2"]);
    }

    #[test]
    fn test_macro_stack_nesting() {
        let mut stack = MacroStack::new();
        stack.push(vec!["outer1".to_string(), "outer2".to_string()]);
        assert_eq!(stack.next_line().as_deref(), Some("outer1"));
        stack.push(vec!["inner".to_string()]);
        assert_eq!(stack.next_line().as_deref(), Some("inner"));
        assert_eq!(stack.next_line().as_deref(), Some("outer2"));
        assert_eq!(stack.next_line(), None);
        assert!(!stack.active());
    }

    #[test]
    fn test_case_folded_macro_lookup() {
        let mut table = MacroTable::new(true);
        table.insert(MacroDef {
            name: "Foo".to_string(),
            params: 0,
            style: MacroStyle::Call,
            body: vec![],
        });
        assert!(table.find("FOO").is_some());
        assert!(table.find("foo").is_some());
    }
}
