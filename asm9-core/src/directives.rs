//! Pseudo-op dispatch and handlers.

use crate::assembler::Assembler;
use crate::image::ImageError;
use crate::symbols::{get_symbol, is_symbol_char};
use crate::types::{Cpu, Phase, Segment, SegmentFormat, Value};
use asm9_common::AsmError;
use std::fs;

/// Keywords reserved as pseudo operations; also consulted by the symbol
/// table when rejecting reserved names used as operands.
pub const PSEUDO_KEYWORDS: &[&str] = &[
    "ALIGN", "BITS", "BSS", "BYTE", "CASE", "CPU", "END", "ENDMOD", "ENDSUB", "EXTERN", "FCB",
    "FCC", "FDB", "FILL", "FORMLN", "INCLUDE", "INTERN", "LIST", "LOAD", "LONG", "MODULE", "ORG",
    "RMB", "SECT", "SETDP", "SIZE", "STORE", "SUBROUTINE", "TTL", "WORD",
];

pub fn is_pseudo_keyword(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    PSEUDO_KEYWORDS.contains(&upper.as_str())
}

fn skip_to_comma(text: &str) -> &str {
    let end = text.find([',', ';']).unwrap_or(text.len());
    &text[end..]
}

fn need_char(text: &str, c: char) -> Option<&str> {
    text.trim_start().strip_prefix(c)
}

/// Parse a quoted string starting at the delimiter character. Escapes:
/// `\r \f \n \t \a \0` plus `\b` (bold colour) and `\s` (standard colour);
/// a `^` after the closing delimiter sets bit 7 of the last character.
fn parse_ascii(text: &str) -> (Vec<u8>, &str) {
    let mut bytes = Vec::new();
    let mut chars = text.chars();
    let delim = chars.next().unwrap();
    let mut rest = chars.as_str();

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        if c == delim {
            break;
        }
        if c == '\\' {
            if let Some(e) = rest.chars().next() {
                rest = &rest[e.len_utf8()..];
                bytes.push(match e {
                    'r' => 13,
                    'f' => 12,
                    'n' => 10,
                    't' => 9,
                    'a' => 7,
                    '0' => 0,
                    'b' => 29,
                    's' => 28,
                    other => other as u8,
                });
            }
        } else {
            bytes.push(c as u8);
        }
    }
    if let Some(r) = rest.strip_prefix('^') {
        if let Some(last) = bytes.last_mut() {
            *last |= 0x80;
        }
        rest = r;
    }
    (bytes, rest)
}

impl Assembler {
    /// Dispatch a pseudo op at the start of `text`. Returns true when one
    /// was recognized and handled.
    pub(crate) fn try_pseudo(&mut self, text: &str) -> Result<bool, AsmError> {
        let t = text.trim_start();
        let end = t.find(|c: char| !is_symbol_char(c)).unwrap_or(t.len());
        if end == 0 {
            return Ok(false);
        }
        let keyword = t[..end].to_ascii_uppercase();
        let rest = &t[end..];

        let handled = match keyword.as_str() {
            "ALIGN" => {
                self.ps_align(rest)?;
                true
            }
            "BITS" => {
                self.ps_bits(rest)?;
                true
            }
            "BSS" => {
                self.ps_bss(rest)?;
                true
            }
            "BYTE" | "FCB" | "FCC" => {
                self.ps_byte(rest)?;
                true
            }
            "CASE" => {
                self.ps_case(rest)?;
                true
            }
            "CPU" => {
                self.ps_cpu(rest)?;
                true
            }
            "END" => {
                self.forced_end = true;
                self.list_source_only();
                true
            }
            "ENDMOD" | "ENDSUB" => {
                self.ps_endsub();
                true
            }
            "EXTERN" | "INTERN" | "TTL" => {
                self.list_source_only();
                true
            }
            "FDB" | "WORD" => {
                self.ps_word(rest)?;
                true
            }
            "FILL" => {
                self.ps_fill(rest)?;
                true
            }
            "FORMLN" => {
                self.list_source_only();
                true
            }
            "INCLUDE" => {
                self.ps_include(rest)?;
                true
            }
            "LIST" => {
                self.ps_list(rest)?;
                true
            }
            "LOAD" => {
                self.ps_load(rest)?;
                true
            }
            "LONG" => {
                self.ps_long(rest)?;
                true
            }
            "MODULE" | "SUBROUTINE" => {
                self.ps_module(rest)?;
                true
            }
            "ORG" => {
                self.ps_org(rest)?;
                true
            }
            "RMB" => {
                self.ps_rmb(rest)?;
                true
            }
            "SECT" => {
                self.ps_sect(rest)?;
                true
            }
            "SETDP" => {
                self.ps_setdp(rest)?;
                true
            }
            "SIZE" => {
                self.list_size_info();
                true
            }
            "STORE" => {
                self.ps_store(rest)?;
                true
            }
            _ => false,
        };

        if handled {
            if let Some(pc) = self.pc.known() {
                if pc > 0x10000 {
                    return Err(self.str_err("Program counter overflow"));
                }
            }
        }
        Ok(handled)
    }

    /// Store one byte, translating image failures into diagnostics.
    pub(crate) fn put(&mut self, addr: i32, v: u8) -> Result<(), AsmError> {
        if addr < 0 || addr as usize >= crate::types::IMAGE_SIZE {
            return Err(self.str_err("Program counter overflow"));
        }
        self.image.put(addr as usize, v).map_err(|e| match e {
            ImageError::Overwrite { addr } => {
                self.str_err(format!("Tried to overwrite address {:04x}", addr))
            }
            ImageError::LengthMismatch { .. } => self.phase_err("Phase error"),
        })
    }

    pub(crate) fn ps_org(&mut self, rest: &str) -> Result<(), AsmError> {
        let v = self.extract_value(rest)?;
        let Some(v) = v.known() else {
            return Err(self.str_err("Program counter overflow"));
        };
        self.pc = Value::Known(v);
        self.listing_push(Some(v as u16), Vec::new(), None);
        Ok(())
    }

    fn ps_align(&mut self, rest: &str) -> Result<(), AsmError> {
        let v = self.extract_value(rest)?;
        if let Some(a) = v.known() {
            if a > 0 && a <= 0x1000 {
                let pc = self.pc_required()?;
                self.pc = Value::Known(pc + (a - pc % a) % a);
            }
        }
        let addr = self.pc.known().map(|p| p as u16);
        self.listing_push(addr, Vec::new(), None);
        Ok(())
    }

    fn ps_rmb(&mut self, rest: &str) -> Result<(), AsmError> {
        let v = self.extract_value(rest)?;
        let size = match v.known() {
            Some(s) if s >= 0 => s,
            _ => return Err(self.syn_err(format!("Illegal RMB size {}", v.hex()))),
        };
        let pc = self.pc_required()?;
        self.listing_push(Some(pc as u16), Vec::new(), None);
        self.pc = Value::Known(pc + size);
        Ok(())
    }

    /// The BSS pseudo op advances the bss pointer without a label; the
    /// labelled form lives in the label definition path.
    fn ps_bss(&mut self, rest: &str) -> Result<(), AsmError> {
        let v = self.extract_value(rest)?;
        let size = match v.known() {
            Some(s) if (1..=32767).contains(&s) => s,
            _ => return Err(self.syn_err(format!("Illegal BSS size {}", v.hex()))),
        };
        self.listing_push(Some(self.bss as u16), Vec::new(), None);
        self.bss += size;
        Ok(())
    }

    fn ps_setdp(&mut self, rest: &str) -> Result<(), AsmError> {
        let v = self.extract_value(rest)?;
        let Some(mut dp) = v.known() else {
            return Err(self.enc_err("Undefined direct page value"));
        };
        if dp > 255 {
            dp >>= 8; // alternate assignment: SETDP $2000 means page $20
        }
        self.dp = dp;
        self.listing_push(None, vec![dp as u8], None);
        Ok(())
    }

    fn ps_cpu(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut t = rest.trim_start();
        if let Some(r) = t.strip_prefix('=') {
            t = r;
        }
        let (v, _) = self.eval_operand(t)?;
        let cpu = v.known().and_then(Cpu::from_number);
        match cpu {
            Some(cpu) => self.cpu = cpu,
            None => {
                return Err(self.syn_err(format!(
                    "Unknown CPU {} - use 6809 or 6309",
                    v.hex()
                )))
            }
        }
        self.list_source_only();
        Ok(())
    }

    fn ps_case(&mut self, rest: &str) -> Result<(), AsmError> {
        match rest.trim_start().chars().next() {
            Some('+') => {
                self.symbols.ignore_case = false;
                self.macros.ignore_case = false;
            }
            Some('-') => {
                self.symbols.ignore_case = true;
                self.macros.ignore_case = true;
            }
            _ => return Err(self.syn_err("Missing '+' or '-' after CASE")),
        }
        self.list_source_only();
        Ok(())
    }

    fn ps_list(&mut self, rest: &str) -> Result<(), AsmError> {
        match rest.trim_start().chars().next() {
            Some('+') => self.list_on = true,
            Some('-') => self.list_on = false,
            _ => return Err(self.syn_err("Missing '+' or '-' after LIST")),
        }
        Ok(())
    }

    fn ps_module(&mut self, rest: &str) -> Result<(), AsmError> {
        let t = rest.trim_start();
        let (name, _) = get_symbol(t, &self.scope);
        let (_, val) = self.define_label(t)?;
        self.module_start = val;
        self.scope = name;
        log::debug!("module scope [{}]", self.scope);
        self.list_source_only();
        Ok(())
    }

    fn ps_endsub(&mut self) {
        self.list_size_info();
        self.scope.clear();
        self.module_start = Value::Undefined;
    }

    /// Listing note with the byte size of the module that just closed.
    pub(crate) fn list_size_info(&mut self) {
        if self.phase != Phase::Two || !self.list_on {
            self.module_start = Value::Undefined;
            return;
        }
        let note = match (self.module_start.known(), self.pc.known()) {
            (Some(start), Some(pc)) => {
                let name = self
                    .symbols
                    .iter()
                    .find(|s| s.value == Value::Known(start))
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                Some(format!("; {} bytes [{}]", pc - start, name))
            }
            _ => None,
        };
        self.module_start = Value::Undefined;
        self.listing_push(self.pc.known().map(|p| p as u16), Vec::new(), note);
    }

    fn ps_byte(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut rest = rest.trim_start();
        let mut bytes: Vec<u8> = Vec::new();

        while !rest.is_empty() && !rest.starts_with(';') {
            rest = rest.trim_start();
            if let Some(r) = rest.strip_prefix("$DATE") {
                bytes.extend(self.opts.date.clone().into_bytes());
                rest = r;
            } else if rest.starts_with('"') || rest.starts_with('\'') {
                let (b, r) = parse_ascii(rest);
                bytes.extend(b);
                rest = r;
            } else {
                let (v, r) = self.eval_operand(rest)?;
                match v.known() {
                    None => {
                        if self.phase == Phase::Two {
                            return Err(self.sym_err("Undefined symbol in BYTE data"));
                        }
                        // worst case: an unresolved value may need two bytes
                        bytes.push(0);
                        bytes.push(0);
                    }
                    Some(v) => {
                        if v > 255 || v < -127 {
                            bytes.push((v >> 8) as u8);
                        }
                        bytes.push(v as u8);
                    }
                }
                rest = r;
            }
            rest = skip_to_comma(rest);
            match rest.chars().next() {
                Some(',') => rest = &rest[1..],
                _ => break,
            }
        }

        if bytes.is_empty() {
            return Err(self.syn_err("Missing byte data"));
        }
        self.emit_data(&bytes)
    }

    fn ps_word(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut rest = rest.trim_start();
        let mut bytes: Vec<u8> = Vec::new();
        while !rest.is_empty() && !rest.starts_with(';') {
            let (v, r) = self.eval_operand(rest)?;
            let v = v.known().unwrap_or(0);
            bytes.push((v >> 8) as u8);
            bytes.push(v as u8);
            rest = skip_to_comma(r);
            match rest.chars().next() {
                Some(',') => rest = &rest[1..],
                _ => break,
            }
        }
        if bytes.len() < 2 {
            return Err(self.syn_err("Missing WORD data"));
        }
        self.emit_data(&bytes)
    }

    fn ps_long(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut rest = rest.trim_start();
        let mut bytes: Vec<u8> = Vec::new();
        while !rest.is_empty() && !rest.starts_with(';') {
            let (v, r) = self.eval_operand(rest)?;
            let v = v.known().unwrap_or(0);
            bytes.extend((v as u32).to_be_bytes());
            rest = skip_to_comma(r);
            match rest.chars().next() {
                Some(',') => rest = &rest[1..],
                _ => break,
            }
        }
        if bytes.len() < 4 {
            return Err(self.syn_err("Missing LONG data"));
        }
        self.emit_data(&bytes)
    }

    /// Shared tail of the data directives: record the byte length on all
    /// labels at this address, emit in phase 2, advance the pc.
    fn emit_data(&mut self, bytes: &[u8]) -> Result<(), AsmError> {
        let pc = self.pc_required()?;
        self.symbols.set_bytes_at(pc, bytes.len());
        if self.phase == Phase::Two {
            for (i, &b) in bytes.iter().enumerate() {
                self.put(pc + i as i32, b)?;
            }
            self.listing_push(Some(pc as u16), bytes.to_vec(), None);
        }
        self.pc = Value::Known(pc + bytes.len() as i32);
        Ok(())
    }

    /// BITS . . * . * . . .  assembles one byte from eight bit cells.
    fn ps_bits(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut v: u8 = 0;
        let mut count = 0;
        for c in rest.chars() {
            if c.is_whitespace() {
                continue;
            }
            if count == 8 {
                break;
            }
            v <<= 1;
            match c {
                '*' => v |= 1,
                '.' => {}
                _ => {
                    return Err(
                        self.syn_err("use only '*' for 1 and '.' for 0 in BITS statement")
                    )
                }
            }
            count += 1;
        }
        if count < 8 {
            return Err(self.syn_err("use only '*' for 1 and '.' for 0 in BITS statement"));
        }
        let pc = self.pc_required()?;
        if self.phase == Phase::Two {
            self.put(pc, v)?;
            self.listing_push(Some(pc as u16), vec![v], None);
        }
        self.pc = Value::Known(pc + 1);
        Ok(())
    }

    /// FILL n (v)
    fn ps_fill(&mut self, rest: &str) -> Result<(), AsmError> {
        let (m, r) = self.eval_operand(rest)?;
        let count = match m.known() {
            Some(c) if (0..=0xffff).contains(&c) => c,
            _ => return Err(self.syn_err(format!("Illegal FILL multiplier {}", m.hex()))),
        };
        let Some(r) = need_char(r, '(') else {
            return Err(self.syn_err("Missing '(' before FILL value"));
        };
        let (v, _) = self.eval_operand(r)?;
        let v = (v.known().unwrap_or(0) & 0xff) as u8;
        let pc = self.pc_required()?;
        if self.phase == Phase::Two {
            for i in 0..count {
                self.put(pc + i, v)?;
            }
            self.listing_push(
                Some(pc as u16),
                vec![v; count.min(3) as usize],
                Some(format!("; {} bytes", count)),
            );
        }
        self.pc = Value::Known(pc + count);
        Ok(())
    }

    fn ps_include(&mut self, rest: &str) -> Result<(), AsmError> {
        let Some(r) = need_char(rest, '"') else {
            return Err(self.syn_err("Missing quoted filename after INCLUDE"));
        };
        let end = r.find('"').unwrap_or(r.len());
        let name = r[..end].to_string();
        self.list_source_only();
        let result = match self.source.as_mut() {
            Some(src) => src.push_file(&name),
            None => Err("no source active".to_string()),
        };
        result.map_err(|msg| self.str_err(msg))
    }

    /// LOAD [addr,]"file"  reads a binary into the image.
    fn ps_load(&mut self, rest: &str) -> Result<(), AsmError> {
        let t = rest.trim_start();
        let (start, advance, quoted) = if t.starts_with('"') {
            (self.pc_required()?, true, t)
        } else {
            let (v, r) = self.eval_operand(t)?;
            let start = match v.known() {
                Some(s) if (0..=0xffff).contains(&s) => s,
                _ => {
                    return Err(self.syn_err(format!("Illegal start address for LOAD {}", v.hex())))
                }
            };
            let Some(r) = need_char(r, ',') else {
                return Err(self.syn_err("Missing ',' after start address"));
            };
            let r = r.trim_start();
            if !r.starts_with('"') {
                return Err(self.syn_err("Missing quote for filename"));
            }
            (start, false, r)
        };
        let inner = &quoted[1..];
        let end = inner.find('"').unwrap_or(inner.len());
        let filename = &inner[..end];

        let data =
            fs::read(filename).map_err(|_| self.str_err(format!("Could not LOAD <{}>", filename)))?;
        if start as usize + data.len() > 0x10000 {
            return Err(self.str_err(format!(
                "LOADING {:04x} to {:04x} violates 64K size",
                start,
                start as usize + data.len()
            )));
        }
        match self.phase {
            Phase::One => self.image.load(start as usize, &data),
            Phase::Two => {
                for (i, &b) in data.iter().enumerate() {
                    if self.image.is_locked(start as usize + i) {
                        return Err(self.str_err("LOAD would overwrite defined values"));
                    }
                    self.put(start + i as i32, b)?;
                }
            }
        }
        self.listing_push(Some(start as u16), Vec::new(), None);
        if advance {
            self.pc = Value::Known(start + data.len() as i32);
        }
        Ok(())
    }

    fn ps_sect(&mut self, rest: &str) -> Result<(), AsmError> {
        let upper = rest.to_ascii_uppercase();
        if let Some(i) = upper.find("LOC=") {
            let (v, _) = self.eval_operand(&rest[i + 4..])?;
            let Some(v) = v.known() else {
                return Err(self.str_err("Program counter overflow"));
            };
            self.pc = Value::Known(v);
        }
        let addr = self.pc.known().map(|p| p as u16);
        self.listing_push(addr, Vec::new(), None);
        Ok(())
    }

    /// STORE start,length,"file"[,format[,entry]] registers an output
    /// segment. Phase 1 ignores the directive so segments register once.
    fn ps_store(&mut self, rest: &str) -> Result<(), AsmError> {
        if self.phase == Phase::One {
            return Ok(());
        }
        let (v, r) = self.eval_operand(rest)?;
        let start = match v.known() {
            Some(s) if (0..=0xffff).contains(&s) => s,
            _ => return Err(self.syn_err(format!("Illegal start address for STORE {}", v.hex()))),
        };
        let Some(r) = need_char(r, ',') else {
            return Err(self.syn_err("Missing ',' after start address"));
        };
        let (v, r) = self.eval_operand(r)?;
        let length = match v.known() {
            Some(l) if (0..=0x10000).contains(&l) => l,
            _ => return Err(self.syn_err(format!("Illegal length for STORE {}", v.hex()))),
        };
        let Some(r) = need_char(r, ',') else {
            return Err(self.syn_err("Missing ',' after length"));
        };
        let r = r.trim_start();
        if !r.starts_with('"') {
            return Err(self.syn_err("Missing quote for filename"));
        }
        let inner = &r[1..];
        let end = inner.find('"').unwrap_or(inner.len());
        let file_name = inner[..end].to_string();
        let mut after = inner.get(end + 1..).unwrap_or("");

        let mut format = SegmentFormat::Raw;
        let mut entry = None;
        if let Some(r) = need_char(after, ',') {
            let upper = r.to_ascii_uppercase();
            if upper.contains("BIN") {
                format = SegmentFormat::Raw;
            } else if upper.contains("SREC") || upper.contains("S19") {
                format = SegmentFormat::SRecord;
            } else {
                return Err(self.syn_err("Unknown output file format"));
            }
            after = r;
            if let Some(i) = after.find(',') {
                let (v, _) = self.eval_operand(&after[i + 1..])?;
                entry = match v.known() {
                    Some(e) if (0..=0xffff).contains(&e) => Some(e as u16),
                    _ => {
                        return Err(self.syn_err(format!(
                            "Illegal execution start address for STORE {}",
                            v.hex()
                        )))
                    }
                };
            }
        }

        log::debug!(
            "storing {:04x} - {:04x} <{}>",
            start,
            start + length - 1,
            file_name
        );
        self.segments.push(Segment {
            start: start as u16,
            length: length as u32,
            file_name,
            format,
            entry,
        });
        self.list_source_only();
        Ok(())
    }
}
