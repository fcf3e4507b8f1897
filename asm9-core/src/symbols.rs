//! Symbol table with scoped names, lazy creation and reference tracking.
//!
//! Lookup goes through a hash index keyed on the case-folded name; the
//! candidate list preserves insertion order so toggling case sensitivity at
//! run time (`CASE +/-`) keeps first-match semantics stable.

use crate::directives::is_pseudo_keyword;
use crate::opcodes;
use crate::types::{AddrMode, Cpu, Phase, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a symbol received its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Created by a forward reference, not yet defined.
    Reference,
    /// Defined by its position (a label on a statement).
    Pos,
    /// `=` or EQU constant.
    Equ,
    /// SET variable, reassignable.
    Set,
    /// ENUM auto-increment constant.
    Enum,
    /// BSS allocation.
    Bss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub line: u32,
    pub mode: Option<AddrMode>,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: Value,
    /// Byte length of the data defined at this label (BYTE/WORD lines).
    pub bytes: usize,
    /// Locked symbols (command-line definitions) reject redefinition.
    pub locked: bool,
    pub kind: SymbolKind,
    pub refs: Vec<SymbolRef>,
}

/// Collaborator-facing view of one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub name: String,
    pub value: Option<i32>,
    pub bytes: usize,
    pub locked: bool,
    pub kind: SymbolKind,
    pub refs: Vec<SymbolRef>,
}

pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: HashMap<String, Vec<usize>>,
    pub ignore_case: bool,
}

impl SymbolTable {
    pub fn new(ignore_case: bool) -> Self {
        Self {
            symbols: Vec::new(),
            index: HashMap::new(),
            ignore_case,
        }
    }

    fn fold(name: &str) -> String {
        name.to_ascii_uppercase()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        let candidates = self.index.get(&Self::fold(name))?;
        if self.ignore_case {
            candidates.first().copied()
        } else {
            candidates
                .iter()
                .copied()
                .find(|&i| self.symbols[i].name == name)
        }
    }

    /// Insert without any reserved-name check; used by definition sites,
    /// where the line dispatcher has already routed mnemonics away.
    pub fn create(&mut self, name: &str, line: u32, kind: SymbolKind) -> usize {
        let idx = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            value: Value::Undefined,
            bytes: 0,
            locked: false,
            kind,
            refs: vec![SymbolRef { line, mode: None }],
        });
        self.index.entry(Self::fold(name)).or_default().push(idx);
        idx
    }

    /// Lookup for an operand reference, creating the symbol with an
    /// undefined value on first sight. Reserved words (mnemonics of the
    /// active CPU, pseudo-op keywords) are rejected here.
    pub fn find_or_create_ref(
        &mut self,
        name: &str,
        line: u32,
        cpu: Cpu,
    ) -> Result<usize, String> {
        if let Some(idx) = self.find(name) {
            return Ok(idx);
        }
        if opcodes::is_mnemonic(name, cpu) || is_pseudo_keyword(name) {
            return Err(format!(
                "Use of reserved mnemonic <{}> as label or operand",
                name
            ));
        }
        Ok(self.create(name, line, SymbolKind::Reference))
    }

    /// Reference history is only recorded during phase 2, once per use.
    pub fn record_ref(&mut self, idx: usize, line: u32, mode: Option<AddrMode>, phase: Phase) {
        if phase == Phase::Two {
            self.symbols[idx].refs.push(SymbolRef { line, mode });
        }
    }

    pub fn get(&self, idx: usize) -> &Symbol {
        &self.symbols[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Symbol {
        &mut self.symbols[idx]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// All symbols whose value equals `addr`; a data line records its byte
    /// length on every label sitting on its address.
    pub fn set_bytes_at(&mut self, addr: i32, bytes: usize) {
        for sym in &mut self.symbols {
            if sym.value == Value::Known(addr) {
                sym.bytes = bytes;
            }
        }
    }

    pub fn undefined_names(&self) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|s| s.value.is_undefined())
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<SymbolSnapshot> {
        self.symbols
            .iter()
            .map(|s| SymbolSnapshot {
                name: s.name.clone(),
                value: s.value.known(),
                bytes: s.bytes,
                locked: s.locked,
                kind: s.kind,
                refs: s.refs.clone(),
            })
            .collect()
    }
}

/// Characters that may appear inside a symbol name.
pub fn is_symbol_char(c: char) -> bool {
    c == '.' || c == '$' || c == '_' || c.is_ascii_alphanumeric()
}

/// Extract a symbol at the start of `text`. A leading `.` expands to the
/// enclosing module scope when one is open. Returns the (possibly empty)
/// name and the remaining text.
pub fn get_symbol<'t>(text: &'t str, scope: &str) -> (String, &'t str) {
    let mut name = String::new();
    let mut rest = text;
    if rest.starts_with('.') && !scope.is_empty() {
        name.push_str(scope);
        name.push('.');
        rest = &rest[1..];
    }
    if rest.starts_with(|c: char| c == '_' || c.is_ascii_alphabetic()) {
        let end = rest
            .find(|c: char| !is_symbol_char(c))
            .unwrap_or(rest.len());
        name.push_str(&rest[..end]);
        rest = &rest[end..];
    }
    (name, rest)
}
