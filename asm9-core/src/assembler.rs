//! The assembly context and two-pass driver.
//!
//! All mutable assembly state lives in one [`Assembler`] object threaded
//! through every component: phase 1 walks the source computing and locking
//! instruction lengths and collecting symbols, phase 2 re-walks the
//! identical source emitting bytes and validating that every length matches
//! what phase 1 locked.

use crate::cond::CondStack;
use crate::expr::OperandEval;
use crate::image::MemoryImage;
use crate::macros::{
    compile_body_line, scan_call_args, MacroDef, MacroStack, MacroStyle, MacroTable,
};
use crate::opcodes::{self, Mnemonic};
use crate::source::SourceStack;
use crate::symbols::{get_symbol, is_symbol_char, SymbolKind, SymbolTable};
use crate::types::{
    AddrMode, AsmOptions, Cpu, ForcedMode, ListingLine, Phase, Segment, Value, LOCAL_RUN_MAX,
    MAX_MACRO_ARGS,
};
use asm9_common::{AsmError, ErrorContext, ErrorReporter, SourcePos};

/// Local anonymous labels: runs of `-` resolve backward against the last
/// seen address of that run length, runs of `+` resolve forward against
/// the phase-1 list of recorded addresses.
pub(crate) struct LocalLabels {
    back: [Value; LOCAL_RUN_MAX + 1],
    fwd: Vec<Vec<i32>>,
}

impl LocalLabels {
    fn new() -> Self {
        Self {
            back: [Value::Undefined; LOCAL_RUN_MAX + 1],
            fwd: vec![Vec::new(); LOCAL_RUN_MAX + 1],
        }
    }

    fn reset_backward(&mut self) {
        self.back = [Value::Undefined; LOCAL_RUN_MAX + 1];
    }

    pub(crate) fn set_backward(&mut self, run: usize, pc: Value) {
        self.back[run] = pc;
    }

    pub(crate) fn backward(&self, run: usize) -> Value {
        self.back[run]
    }

    /// Forward labels are recorded in phase 1 only; both phases query the
    /// same list.
    pub(crate) fn record_forward(&mut self, run: usize, pc: i32) {
        self.fwd[run].push(pc);
    }

    /// Smallest recorded address beyond `pc`, scanning the (address
    /// ordered) list from the end while entries lie past `pc`.
    pub(crate) fn resolve_forward(&self, run: usize, pc: i32) -> Value {
        let mut v = Value::Undefined;
        for &addr in self.fwd[run].iter().rev() {
            if addr > pc {
                v = Value::Known(addr);
            } else {
                break;
            }
        }
        v
    }
}

pub struct Assembler {
    pub opts: AsmOptions,
    pub(crate) cpu: Cpu,
    pub(crate) symbols: SymbolTable,
    pub(crate) macros: MacroTable,
    pub(crate) mac_stack: MacroStack,
    pub(crate) cond: CondStack,
    pub(crate) image: MemoryImage,
    pub(crate) segments: Vec<Segment>,
    pub(crate) reporter: ErrorReporter,

    pub(crate) pc: Value,
    pub(crate) bss: i32,
    pub(crate) dp: i32,
    pub(crate) phase: Phase,
    pub(crate) scope: String,
    pub(crate) module_start: Value,
    pub(crate) enum_value: i32,
    pub(crate) forced: ForcedMode,
    pub(crate) forced_end: bool,
    pub(crate) list_on: bool,
    pub(crate) local: LocalLabels,
    pub(crate) mode_tag: Option<AddrMode>,

    pub(crate) source: Option<SourceStack>,
    pub(crate) line: String,
    pub(crate) file: String,
    pub(crate) line_no: u32,
    total_lines: u32,

    pub(crate) listing: Vec<ListingLine>,
    pub(crate) hints: Vec<String>,
}

impl Assembler {
    pub fn new(opts: AsmOptions) -> Self {
        let cpu = opts.cpu;
        let ignore_case = opts.ignore_case;
        let max_errors = opts.max_errors;
        let preset = opts.preset;
        Self {
            opts,
            cpu,
            symbols: SymbolTable::new(ignore_case),
            macros: MacroTable::new(ignore_case),
            mac_stack: MacroStack::new(),
            cond: CondStack::new(),
            image: MemoryImage::new(preset),
            segments: Vec::new(),
            reporter: ErrorReporter::new(max_errors),
            pc: Value::Undefined,
            bss: 0,
            dp: 0,
            phase: Phase::One,
            scope: String::new(),
            module_start: Value::Undefined,
            enum_value: -1,
            forced: ForcedMode::Auto,
            forced_end: false,
            list_on: true,
            local: LocalLabels::new(),
            mode_tag: None,
            source: None,
            line: String::new(),
            file: String::new(),
            line_no: 0,
            total_lines: 0,
            listing: Vec::new(),
            hints: Vec::new(),
        }
    }

    /// Define a locked symbol before assembly starts (`-D` on the command
    /// line). Locked symbols reject any differing redefinition.
    pub fn define_symbol(&mut self, name: &str, value: i32) {
        let idx = match self.symbols.find(name) {
            Some(idx) => idx,
            None => self.symbols.create(name, 0, SymbolKind::Equ),
        };
        let sym = self.symbols.get_mut(idx);
        sym.value = Value::Known(value);
        sym.kind = SymbolKind::Equ;
        sym.locked = true;
    }

    // ----- accessors for output collaborators -----

    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn macro_count(&self) -> usize {
        self.macros.len()
    }

    pub fn listing(&self) -> &[ListingLine] {
        &self.listing
    }

    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    pub fn error_count(&self) -> usize {
        self.reporter.error_count()
    }

    /// Errors reported without aborting assembly (undefined-symbol sweep,
    /// program counter overflow in phase 2).
    pub fn errors(&self) -> &[AsmError] {
        self.reporter.errors()
    }

    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }

    // ----- two-pass driver -----

    /// Run both passes over `source`, then sweep for undefined symbols.
    pub fn assemble(&mut self, file: &str, source: &str) -> Result<(), AsmError> {
        self.run_phase(Phase::One, file, source)?;
        self.check_conditionals_closed()?;
        self.run_phase(Phase::Two, file, source)?;
        self.sweep_undefined();
        Ok(())
    }

    fn begin_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.pc = Value::Undefined;
        self.bss = 0;
        self.dp = 0;
        self.cpu = self.opts.cpu;
        self.scope.clear();
        self.module_start = Value::Undefined;
        self.enum_value = -1;
        self.forced_end = false;
        self.list_on = true;
        self.local.reset_backward();
        self.line_no = 0;
    }

    fn run_phase(&mut self, phase: Phase, file: &str, source: &str) -> Result<(), AsmError> {
        log::debug!("phase {:?} of {}", phase, file);
        self.begin_phase(phase);
        self.source = Some(SourceStack::new(file, source));
        self.file = file.to_string();
        let result = self.phase_loop();
        self.source = None;
        result
    }

    fn phase_loop(&mut self) -> Result<(), AsmError> {
        while !self.forced_end {
            let Some(line) = self.next_source_line() else {
                break;
            };
            self.line = line.clone();
            self.parse_line(&line)?;
            if self.phase == Phase::Two && self.reporter.at_limit() {
                log::warn!("error count reached maximum, assembly stopped");
                break;
            }
        }
        Ok(())
    }

    /// Macro expansion lines drain ahead of the include stack and do not
    /// advance the source line number.
    fn next_source_line(&mut self) -> Option<String> {
        if let Some(line) = self.mac_stack.next_line() {
            return Some(line);
        }
        self.next_raw_line()
    }

    /// A line straight from the include stack, bypassing any in-flight
    /// macro expansion (macro bodies are recorded from raw source).
    fn next_raw_line(&mut self) -> Option<String> {
        let src = self.source.as_mut()?;
        let line = src.next_line()?;
        if src.file() != self.file {
            self.file = src.file().to_string();
        }
        self.line_no = src.line();
        self.total_lines += 1;
        Some(line)
    }

    fn check_conditionals_closed(&mut self) -> Result<(), AsmError> {
        let depth = self.cond.depth();
        if depth == 0 {
            return Ok(());
        }
        for _ in 0..depth {
            self.reporter.report(AsmError::structural(
                "an endif statement is missing",
                self.err_ctx(),
            ));
        }
        Err(AsmError::structural(
            format!("{} endif statement(s) are missing", depth),
            self.err_ctx(),
        ))
    }

    /// Post-assembly report of symbols that never received a value. This
    /// is the one non-fatal error class: each undefined symbol adds to the
    /// error count without stopping anything.
    fn sweep_undefined(&mut self) {
        let undefined: Vec<String> = self
            .symbols
            .undefined_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        for name in undefined {
            self.reporter.report(AsmError::symbol(
                format!("Undefined symbol [{}]", name),
                ErrorContext::new(SourcePos::new(&self.file, self.line_no), ""),
            ));
        }
    }

    // ----- shared helpers -----

    pub(crate) fn err_ctx(&self) -> ErrorContext {
        ErrorContext::new(SourcePos::new(&self.file, self.line_no), &self.line)
    }

    pub(crate) fn syn_err(&self, message: impl Into<String>) -> AsmError {
        AsmError::syntax(message, self.err_ctx())
    }

    pub(crate) fn sym_err(&self, message: impl Into<String>) -> AsmError {
        AsmError::symbol(message, self.err_ctx())
    }

    pub(crate) fn enc_err(&self, message: impl Into<String>) -> AsmError {
        AsmError::encoding(message, self.err_ctx())
    }

    pub(crate) fn str_err(&self, message: impl Into<String>) -> AsmError {
        AsmError::structural(message, self.err_ctx())
    }

    pub(crate) fn phase_err(&self, message: impl Into<String>) -> AsmError {
        AsmError::phase(message, self.err_ctx())
    }

    /// Evaluate an expression prefix of `text`, returning the value and
    /// the unconsumed remainder.
    pub(crate) fn eval_operand<'t>(
        &mut self,
        text: &'t str,
    ) -> Result<(Value, &'t str), AsmError> {
        let pos = SourcePos::new(&self.file, self.line_no);
        let mut ev = OperandEval::new(
            &mut self.symbols,
            &mut self.forced,
            self.pc,
            self.phase,
            self.cpu,
            &self.scope,
            pos,
            self.mode_tag,
            text,
        );
        let v = ev.eval(0)?;
        let rest = ev.rest();
        Ok((v, rest))
    }

    /// Extract the operand field: leading `<`/`>` set the forced mode, the
    /// text runs to the `;` comment (quotes respected) and is trimmed.
    pub(crate) fn extract_op_text(&mut self, text: &str) -> String {
        self.forced = ForcedMode::Auto;
        let mut p = text.trim_start();
        if let Some(r) = p.strip_prefix('<') {
            self.forced = ForcedMode::Direct;
            p = r;
        } else if let Some(r) = p.strip_prefix('>') {
            self.forced = ForcedMode::Extended;
            p = r;
        }
        let mut out = String::new();
        let mut inquo = false;
        let mut inapo = false;
        for c in p.chars() {
            if c == '"' && !inapo {
                inquo = !inquo;
            }
            if c == '\'' && !inquo {
                inapo = !inapo;
            }
            if c == ';' && !inquo && !inapo {
                break;
            }
            out.push(c);
        }
        out.trim_end().to_string()
    }

    /// Extract and fully evaluate one operand; trailing text is an error.
    pub(crate) fn extract_value(&mut self, text: &str) -> Result<Value, AsmError> {
        let optext = self.extract_op_text(text);
        if optext.is_empty() {
            return Err(self.syn_err("Empty operand"));
        }
        let (v, rest) = self.eval_operand(&optext)?;
        if !rest.is_empty() {
            return Err(self.syn_err("Extra text after operand"));
        }
        Ok(v)
    }

    /// Known program counter, or the undefined-PC error.
    pub(crate) fn pc_required(&self) -> Result<i32, AsmError> {
        self.pc
            .known()
            .ok_or_else(|| self.enc_err("Undefined program counter (PC)"))
    }

    pub(crate) fn listing_push(
        &mut self,
        addr: Option<u16>,
        bytes: Vec<u8>,
        note: Option<String>,
    ) {
        if self.phase == Phase::Two && self.list_on {
            self.listing.push(ListingLine {
                line: self.line_no,
                addr,
                bytes,
                text: self.line.clone(),
                note,
            });
        }
    }

    pub(crate) fn list_source_only(&mut self) {
        self.listing_push(None, Vec::new(), None);
    }

    // ----- line dispatch -----

    fn parse_line(&mut self, raw: &str) -> Result<(), AsmError> {
        self.mode_tag = None;
        let mut cp: &str = raw.trim_start();
        log::trace!("{:5} {} parse[{:?}]: {}", self.line_no, self.pc.hex(), self.phase, cp);

        if self.check_condition(cp)? {
            return Ok(());
        }
        if self.cond.skipping() {
            self.listing_push(None, Vec::new(), Some("SKIP".to_string()));
            return Ok(());
        }
        if cp.is_empty() || cp.starts_with(';') {
            self.list_source_only();
            return Ok(());
        }
        if cp.starts_with('*') && !cp[1..].trim_start().starts_with('=') {
            // a star comment, not a "* = address" assignment
            self.list_source_only();
            return Ok(());
        }

        // local anonymous labels: a run of '-' or '+' at line start
        if cp.starts_with('-') || cp.starts_with('+') {
            cp = self.define_local_label(cp).trim_start();
        }

        // pseudo op without a label
        if self.try_pseudo(cp)? {
            return Ok(());
        }

        let mut mnemonic: Option<(&'static Mnemonic, usize)> = None;
        if cp.starts_with(|c: char| c == '.' || c == '_' || c.is_ascii_alphabetic()) {
            if is_macro_header(cp) {
                return self.record_macro(cp);
            }
            match lookup_mnemonic_token(cp, self.cpu) {
                Some(hit) => mnemonic = Some(hit),
                None => {
                    if self.try_expand_macro(cp)? {
                        return Ok(());
                    }
                    let (rest, val) = self.define_label(cp)?;
                    let rest = rest.trim_start();
                    if !rest.is_empty() && self.try_expand_macro(rest)? {
                        return Ok(());
                    }
                    if rest.is_empty() || rest.starts_with(';') {
                        self.listing_push(val.known().map(|v| v as u16), Vec::new(), None);
                        return Ok(());
                    }
                    cp = rest;
                }
            }
        }

        if self.forced_end || cp.is_empty() || cp.starts_with(';') {
            return Ok(());
        }
        if let Some(rest) = cp.strip_prefix('&') {
            return self.set_bss_pointer(rest);
        }
        if let Some(rest) = cp.strip_prefix('*') {
            return self.set_pc_assign(rest);
        }
        if mnemonic.is_none() {
            // pseudo op or mnemonic after a label
            if self.try_pseudo(cp)? {
                return Ok(());
            }
            mnemonic = lookup_mnemonic_token(cp, self.cpu);
        }
        if let Some((m, len)) = mnemonic {
            let optext = self.extract_op_text(&cp[len..]);
            return self.generate_code(m, &optext);
        }

        Err(self.syn_err("Syntax error"))
    }

    /// Record a local label line. The run and the character terminating
    /// it are both consumed; the rest of the line is processed normally.
    fn define_local_label<'t>(&mut self, cp: &'t str) -> &'t str {
        let marker = cp.chars().next().unwrap();
        let count = cp.chars().take_while(|&c| c == marker).count();
        let run = count.min(LOCAL_RUN_MAX);
        if marker == '-' {
            self.local.set_backward(run, self.pc);
        } else if self.phase == Phase::One {
            if let Some(pc) = self.pc.known() {
                self.local.record_forward(run, pc);
            }
        }
        let mut rest = &cp[count..];
        if let Some(c) = rest.chars().next() {
            rest = &rest[c.len_utf8()..];
        }
        rest
    }

    // ----- conditional assembly -----

    /// Handle if/ifdef/ifndef/else/endif and `#error`. Returns true when
    /// the line was a conditional directive.
    fn check_condition(&mut self, cp: &str) -> Result<bool, AsmError> {
        let p = cp.strip_prefix('#').unwrap_or(cp);

        if let Some(rest) = strip_keyword(p, "error") {
            if self.phase == Phase::One {
                if self.cond.skipping() {
                    return Ok(false);
                }
                return Err(self.str_err(rest.trim().to_string()));
            }
            return Ok(true);
        }

        let (kind, rest) = if let Some(rest) = strip_keyword(p, "ifdef") {
            ("ifdef", rest)
        } else if let Some(rest) = strip_keyword(p, "ifndef") {
            ("ifndef", rest)
        } else if let Some(rest) = strip_keyword(p, "if") {
            ("if", rest)
        } else if strip_keyword(p, "else").is_some() {
            self.cond.flip();
            self.list_source_only();
            return Ok(true);
        } else if strip_keyword(p, "endif").is_some() {
            if !self.cond.pop() {
                return Err(self.str_err("endif without if"));
            }
            self.list_source_only();
            return Ok(true);
        } else {
            return Ok(false);
        };

        let (v, _) = self.eval_operand(rest)?;
        let skip = match kind {
            "ifdef" => v.is_undefined(),
            "ifndef" => !v.is_undefined(),
            _ => v.is_undefined() || v == Value::Known(0),
        };
        if !self.cond.push(skip) {
            return Err(self.str_err("More than 10 IF or IFDEF conditions nested"));
        }
        let note = if skip { "FALSE" } else { "TRUE" };
        self.listing_push(None, Vec::new(), Some(note.to_string()));
        Ok(true)
    }

    // ----- label definition -----

    /// Define the label at the start of `text`, handling the `=`, EQU,
    /// SET, ENUM and BSS forms as well as definition by position. Returns
    /// the unconsumed text and the assigned value.
    pub(crate) fn define_label<'t>(
        &mut self,
        text: &'t str,
    ) -> Result<(&'t str, Value), AsmError> {
        let (name, rest) = get_symbol(text, &self.scope);
        let mut rest = rest;
        if let Some(r) = rest.strip_prefix(':') {
            rest = r;
        }
        let rest = rest.trim_start();

        if rest.starts_with('=') {
            let value = self.extract_value(&rest[1..])?;
            self.assign_symbol(&name, value, SymbolKind::Equ)?;
            return Ok(("", value));
        }
        if let Some(r) = strip_keyword(rest, "EQU") {
            let value = self.extract_value(r)?;
            self.assign_symbol(&name, value, SymbolKind::Equ)?;
            return Ok(("", value));
        }
        if let Some(r) = strip_keyword(rest, "SET") {
            let value = self.extract_value(r)?;
            self.assign_symbol(&name, value, SymbolKind::Set)?;
            return Ok(("", value));
        }
        if let Some(r) = strip_keyword(rest, "ENUM") {
            let optext = self.extract_op_text(r);
            let value = if optext.is_empty() {
                Value::Known(self.enum_value + 1)
            } else {
                let (v, tail) = self.eval_operand(&optext)?;
                if !tail.is_empty() {
                    return Err(self.syn_err("Extra text after label assignment"));
                }
                v
            };
            self.assign_symbol(&name, value, SymbolKind::Enum)?;
            if let Some(v) = value.known() {
                self.enum_value = v;
            }
            return Ok(("", value));
        }
        if let Some(r) = strip_keyword(rest, "BSS") {
            let size = self.extract_value(r)?;
            let Some(size) = size.known() else {
                return Err(self.syn_err("Illegal BSS size"));
            };
            let value = Value::Known(self.bss);
            self.assign_symbol(&name, value, SymbolKind::Bss)?;
            self.bss += size;
            return Ok(("", value));
        }

        // definition by position
        let value = self.pc;
        self.assign_symbol(&name, value, SymbolKind::Pos)?;
        Ok((rest, value))
    }

    /// Conflict policy: SET always reassigns; every other kind may be
    /// assigned once, with an identical re-assignment tolerated (that is
    /// how phase 1 and phase 2 agree without special-casing). Locked
    /// symbols reject any differing assignment.
    fn assign_symbol(&mut self, name: &str, value: Value, kind: SymbolKind) -> Result<(), AsmError> {
        let idx = match self.symbols.find(name) {
            Some(idx) => idx,
            None => self.symbols.create(name, self.line_no, kind),
        };
        let old = self.symbols.get(idx).value;
        let locked = self.symbols.get(idx).locked;

        if old.is_undefined() {
            let sym = self.symbols.get_mut(idx);
            sym.value = value;
            sym.kind = kind;
            return Ok(());
        }
        if locked {
            if old == value {
                return Ok(());
            }
            return Err(self.sym_err(format!(
                "Multiple assignment for locked symbol [{}]: {} vs {}",
                name,
                old.hex(),
                value.hex()
            )));
        }
        if kind == SymbolKind::Set {
            let sym = self.symbols.get_mut(idx);
            sym.value = value;
            sym.kind = kind;
            return Ok(());
        }
        if old == value {
            return Ok(());
        }
        let message = match (kind, self.phase) {
            (SymbolKind::Enum, _) => format!("ENUM phase error for [{}]", name),
            (SymbolKind::Bss, _) => format!(
                "Multiple assignments for BSS label [{}]: 1st value = {}, 2nd value = {}",
                name,
                old.hex(),
                value.hex()
            ),
            (SymbolKind::Pos, Phase::Two) => format!(
                "Phase error label [{}]: phase 1: {}, phase 2: {}",
                name,
                old.hex(),
                value.hex()
            ),
            (SymbolKind::Pos, Phase::One) => format!(
                "Multiple label definition [{}]: value 1: {}, value 2: {}",
                name,
                old.hex(),
                value.hex()
            ),
            _ => format!(
                "Multiple assignments for label [{}]: 1st value = {}, 2nd value = {}",
                name,
                old.hex(),
                value.hex()
            ),
        };
        if kind == SymbolKind::Pos && self.phase == Phase::Two {
            Err(self.phase_err(message))
        } else {
            Err(self.sym_err(message))
        }
    }

    // ----- '&' and '*' assignments -----

    fn set_bss_pointer(&mut self, rest: &str) -> Result<(), AsmError> {
        let rest = rest.trim_start();
        let Some(r) = rest.strip_prefix('=') else {
            return Err(self.syn_err("Missing '=' in set BSS & instruction"));
        };
        let v = self.extract_value(r)?;
        let Some(v) = v.known() else {
            return Err(self.syn_err("Undefined BSS address"));
        };
        self.bss = v;
        self.listing_push(Some(v as u16), Vec::new(), None);
        Ok(())
    }

    fn set_pc_assign(&mut self, rest: &str) -> Result<(), AsmError> {
        let rest = rest.trim_start();
        let Some(r) = rest.strip_prefix('=') else {
            return Err(self.syn_err("Setting PC with \"* = address\" syntax error"));
        };
        self.ps_org(r)
    }

    // ----- macros -----

    /// Record a macro definition. Both header styles are accepted:
    /// `MACRO Name(a,b)` and `Name MACRO a,b`. The raw body is consumed
    /// from the source until a line containing ENDM.
    fn record_macro(&mut self, cp: &str) -> Result<(), AsmError> {
        let (style, name, arg_text) = if let Some(rest) = strip_keyword(cp, "MACRO") {
            let (name, after) = get_symbol(rest.trim_start(), "");
            (MacroStyle::Call, name, after.trim_start().to_string())
        } else {
            let (name, after) = get_symbol(cp, "");
            let after = after.trim_start();
            let Some(rest) = strip_keyword(after, "MACRO") else {
                return Err(self.syn_err("Syntax error in macro definition"));
            };
            (MacroStyle::Plain, name, rest.trim_start().to_string())
        };

        let mut params: Vec<String> = Vec::new();
        let mut args = arg_text.as_str().trim_start();
        if let Some(r) = args.strip_prefix('(') {
            args = r;
        }
        while !args.is_empty() && !args.starts_with(')') && !args.starts_with(';') {
            let (param, rest) = get_symbol(args.trim_start(), "");
            params.push(param);
            if params.len() > MAX_MACRO_ARGS {
                return Err(self.syn_err("Too many macro parameters"));
            }
            let rest = rest.trim_start();
            if rest.starts_with(')') || rest.is_empty() || rest.starts_with(';') {
                break;
            }
            let Some(rest) = rest.strip_prefix(',') else {
                return Err(self.syn_err("Syntax error in macro definition"));
            };
            args = rest;
        }

        if self.macros.find(&name).is_some() {
            if self.phase == Phase::One {
                return Err(self.sym_err(format!("Duplicate macro [{}]", name)));
            }
            // phase 2: replay the previously recorded definition for the
            // listing and discard the body lines
            self.list_source_only();
            while let Some(line) = self.next_raw_line() {
                let done = line.to_ascii_uppercase().contains("ENDM");
                self.line = line;
                self.list_source_only();
                if done {
                    break;
                }
            }
            return Ok(());
        }

        let mut body = Vec::new();
        while let Some(line) = self.next_raw_line() {
            if line.to_ascii_uppercase().contains("ENDM") {
                break;
            }
            body.push(compile_body_line(&line, &params));
        }
        log::debug!("recorded macro {} ({} params)", name, params.len());
        self.macros.insert(MacroDef {
            name,
            params: params.len(),
            style,
            body,
        });
        Ok(())
    }

    /// Expand a macro call if `cp` starts with a known macro name.
    fn try_expand_macro(&mut self, cp: &str) -> Result<bool, AsmError> {
        let end = cp.find(|c: char| !is_symbol_char(c)).unwrap_or(cp.len());
        if end == 0 {
            return Ok(false);
        }
        let Some(idx) = self.macros.find(&cp[..end]) else {
            return Ok(false);
        };
        let expected = self.macros.get(idx).params;
        let name = self.macros.get(idx).name.clone();

        let mut rest = cp[end..].trim_start();
        if let Some(r) = rest.strip_prefix('(') {
            rest = r;
        }
        let optext = self.extract_op_text(rest);
        let args = scan_call_args(&optext, expected);
        if args.len() != expected {
            return Err(self.str_err(format!(
                "Wrong # of arguments in [{}] called ({}) defined ({})",
                name,
                args.len(),
                expected
            )));
        }
        let lines = self.macros.get(idx).expand(&args);
        log::debug!("expanding macro {} (depth {})", name, self.mac_stack.depth() + 1);
        self.mac_stack.push(lines);
        self.list_source_only();
        Ok(true)
    }
}

/// Keyword match at a word boundary, case-insensitive. Returns the text
/// after the keyword on a hit.
pub(crate) fn strip_keyword<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let n = keyword.len();
    let head = text.get(..n)?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &text[n..];
    if rest.starts_with(is_symbol_char) {
        return None;
    }
    Some(rest)
}

/// Mnemonic lookup on the leading token of `cp`; the token must end at a
/// word boundary so a label like LDAX is not read as LDA.
fn lookup_mnemonic_token(cp: &str, cpu: Cpu) -> Option<(&'static Mnemonic, usize)> {
    let end = cp.find(|c: char| !is_symbol_char(c)).unwrap_or(cp.len());
    let m = opcodes::lookup(&cp[..end], cpu)?;
    Some((m, end))
}

/// A macro header is either `MACRO name ...` or `name MACRO ...`.
fn is_macro_header(cp: &str) -> bool {
    if strip_keyword(cp, "MACRO").is_some() {
        return true;
    }
    let (_, rest) = get_symbol(cp, "");
    strip_keyword(rest.trim_start(), "MACRO").is_some()
}
