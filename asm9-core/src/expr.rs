//! Operand expression evaluator.
//!
//! A precedence-climbing parser over the operand text. The caller supplies
//! a minimum operator priority; the evaluator consumes the longest valid
//! prefix and leaves the cursor on the first unconsumed character, so the
//! encoder can continue scanning commas, brackets and index registers.
//!
//! Undefined operands (forward references during phase 1) propagate through
//! every binary operator instead of failing, which lets phase 1 settle
//! instruction lengths before all addresses are known. Division by zero
//! also yields an undefined value, never an error.

use crate::symbols::{get_symbol, is_symbol_char, SymbolTable};
use crate::types::{AddrMode, Cpu, ForcedMode, Phase, Value};
use asm9_common::{AsmError, ErrorContext, SourcePos};

type BinFn = fn(i32, i32) -> Option<i32>;

/// Binary operator table. Scan order is load bearing: two-character
/// operators must match before their one-character prefixes (`<<` before
/// `<=` before `<`, `&&` before `&`, `||` before `|`). The priorities are
/// deliberately asymmetric between the bitwise and logical groups and are
/// user-visible behavior.
#[rustfmt::skip]
const BINOPS: [(&str, u8, BinFn); 17] = [
    ("*",  11, |l, r| Some(l.wrapping_mul(r))),
    ("/",  11, |l, r| if r == 0 { None } else { Some(l.wrapping_div(r)) }),
    ("+",  10, |l, r| Some(l.wrapping_add(r))),
    ("-",  10, |l, r| Some(l.wrapping_sub(r))),
    ("<<",  9, |l, r| Some(l.wrapping_shl(r as u32))),
    (">>",  9, |l, r| Some(l.wrapping_shr(r as u32))),
    ("<=",  8, |l, r| Some((l <= r) as i32)),
    ("<",   8, |l, r| Some((l < r) as i32)),
    (">=",  8, |l, r| Some((l >= r) as i32)),
    (">",   8, |l, r| Some((l > r) as i32)),
    ("==",  7, |l, r| Some((l == r) as i32)),
    ("!=",  7, |l, r| Some((l != r) as i32)),
    ("^",   5, |l, r| Some(l ^ r)),
    ("&&",  3, |l, r| Some((l != 0 && r != 0) as i32)),
    ("&",   6, |l, r| Some(l & r)),
    ("||",  2, |l, r| Some((l != 0 || r != 0) as i32)),
    ("|",   4, |l, r| Some(l | r)),
];

const UNARY_START: &str = "[(+-!~<>*$'\"%?";
const BINOP_START: &str = "*/+-<>=!&^|";

/// One operand evaluation: borrows the pieces of assembler state the
/// expression language can observe or mutate.
pub struct OperandEval<'a, 't> {
    pub symbols: &'a mut SymbolTable,
    pub forced: &'a mut ForcedMode,
    pub pc: Value,
    pub phase: Phase,
    pub cpu: Cpu,
    pub scope: &'a str,
    pub pos: SourcePos,
    /// Addressing-mode tag recorded with symbol references.
    pub mode_tag: Option<AddrMode>,
    origin: &'t str,
    rest: &'t str,
}

impl<'a, 't> OperandEval<'a, 't> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbols: &'a mut SymbolTable,
        forced: &'a mut ForcedMode,
        pc: Value,
        phase: Phase,
        cpu: Cpu,
        scope: &'a str,
        pos: SourcePos,
        mode_tag: Option<AddrMode>,
        text: &'t str,
    ) -> Self {
        Self {
            symbols,
            forced,
            pc,
            phase,
            cpu,
            scope,
            pos,
            mode_tag,
            origin: text,
            rest: text,
        }
    }

    /// Unconsumed text after evaluation.
    pub fn rest(&self) -> &'t str {
        self.rest
    }

    fn err(&self, message: impl Into<String>) -> AsmError {
        let caret = self.origin.len() - self.rest.len();
        AsmError::syntax(
            message,
            ErrorContext::with_caret(self.pos.clone(), self.origin, caret),
        )
    }

    fn skip_space(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn advance(&mut self, n: usize) {
        self.rest = &self.rest[n..];
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    /// Evaluate an expression whose binary operators must bind tighter
    /// than `prio`. The public entry point is `prio == 0`.
    pub fn eval(&mut self, prio: u8) -> Result<Value, AsmError> {
        self.skip_space();

        let c = match self.peek() {
            Some(c) => c,
            None => return Err(self.err("Illegal operand")),
        };

        // A leading comma is not an expression; the indexed-mode scanner
        // handles forms like ",X" itself.
        if c == ',' {
            return Ok(Value::Undefined);
        }

        let mut value = if UNARY_START.contains(c) {
            self.eval_unary(c)?
        } else if c.is_ascii_digit() {
            self.eval_decimal()?
        } else if is_symbol_char(c) {
            self.eval_symbol()?
        } else {
            return Err(self.err("Illegal operand"));
        };

        // Left operand parsed; climb through binary operators.
        self.skip_space();
        while let Some(c) = self.peek() {
            if !BINOP_START.contains(c) {
                break;
            }
            let Some(&(op, op_prio, f)) =
                BINOPS.iter().find(|&&(op, _, _)| self.rest.starts_with(op))
            else {
                return Err(self.err("Syntax error: binary operator expected"));
            };
            if op_prio <= prio {
                break;
            }
            self.advance(op.len());
            let right = self.eval(op_prio)?;
            value = match (value.known(), right.known()) {
                (Some(l), Some(r)) => match f(l, r) {
                    Some(v) => Value::Known(v),
                    None => Value::Undefined,
                },
                _ => Value::Undefined,
            };
            self.skip_space();
        }

        Ok(value)
    }

    fn eval_unary(&mut self, c: char) -> Result<Value, AsmError> {
        match c {
            '(' | '[' => {
                let closer = if c == '[' { ']' } else { ')' };
                self.advance(1);
                let v = self.eval(0)?;
                self.skip_space();
                if self.peek() != Some(closer) {
                    return Err(self.err(format!("Missing closing {}", closer)));
                }
                self.advance(1);
                Ok(v)
            }
            '+' => {
                self.advance(1);
                self.eval(12)
            }
            '-' => {
                self.advance(1);
                Ok(self.eval(12)?.map(i32::wrapping_neg))
            }
            '!' => {
                self.advance(1);
                Ok(self.eval(12)?.map(|v| (v == 0) as i32))
            }
            '~' => {
                self.advance(1);
                Ok(self.eval(12)?.map(|v| !v))
            }
            '<' => {
                self.advance(1);
                let v = self.eval(12)?;
                *self.forced = ForcedMode::Direct;
                Ok(v)
            }
            '>' => {
                self.advance(1);
                let v = self.eval(12)?;
                *self.forced = ForcedMode::Extended;
                Ok(v)
            }
            '*' => {
                self.advance(1);
                Ok(self.pc)
            }
            '$' => {
                self.advance(1);
                Ok(self.eval_hex_digits())
            }
            '\'' => {
                self.advance(1);
                self.eval_char()
            }
            '"' => {
                self.advance(1);
                self.eval_multi_char()
            }
            '%' => {
                self.advance(1);
                Ok(self.eval_binary_literal())
            }
            '?' => {
                self.advance(1);
                self.eval_symbol_bytes()
            }
            _ => unreachable!("unary dispatch covers UNARY_START"),
        }
    }

    /// Hex digit run after `$`. An empty run yields zero, so `$` alone is
    /// a zero constant.
    fn eval_hex_digits(&mut self) -> Value {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(self.rest.len());
        let v = i64::from_str_radix(&self.rest[..end], 16).unwrap_or(0);
        self.advance(end);
        Value::Known(v as i32)
    }

    /// Decimal constant, or the `xxxxH` hex syntax (at most 5 hex digits
    /// before the `H`).
    fn eval_decimal(&mut self) -> Result<Value, AsmError> {
        let bytes = self.rest.as_bytes();
        let mut n = 0;
        while n < 5 && n < bytes.len() && bytes[n].is_ascii_hexdigit() {
            n += 1;
        }
        if n > 0 && n < bytes.len() && (bytes[n] == b'H' || bytes[n] == b'h') {
            let v = i64::from_str_radix(&self.rest[..n], 16).unwrap_or(0);
            self.advance(n + 1);
            return Ok(Value::Known(v as i32));
        }

        let end = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        let v: i64 = self.rest[..end].parse().unwrap_or(0);
        self.advance(end);
        if let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                return Err(if c.is_ascii_hexdigit() {
                    self.err("Wrong decimal constant or leading $ for hex missing")
                } else {
                    self.err("Illegal character in decimal constant")
                });
            }
        }
        Ok(Value::Known(v as i32))
    }

    /// Character constant after the opening apostrophe. Escapes:
    /// `\r \n \a \e \0`.
    fn eval_char(&mut self) -> Result<Value, AsmError> {
        let mut v = 0;
        if let Some(c) = self.peek() {
            if c == '\\' {
                self.advance(1);
                if let Some(e) = self.peek() {
                    v = match e {
                        'r' => 13,
                        'n' => 10,
                        'a' => 7,
                        'e' => 27,
                        '0' => 0,
                        other => other as i32,
                    };
                    self.advance(e.len_utf8());
                }
            } else {
                v = c as i32;
                self.advance(c.len_utf8());
            }
        }
        match self.peek() {
            Some('\'') => self.advance(1),
            None => {}
            Some(_) => {
                return Err(self.err("Missing ' delimiter after character operand"));
            }
        }
        Ok(Value::Known(v))
    }

    /// Multi-character constant after the opening quote: up to 4 chars
    /// packed big-endian.
    fn eval_multi_char(&mut self) -> Result<Value, AsmError> {
        let mut v: i32 = 0;
        for _ in 0..4 {
            match self.peek() {
                Some('"') | None => break,
                Some(c) => {
                    v = (v << 8) | (c as i32 & 0xff);
                    self.advance(c.len_utf8());
                }
            }
        }
        if self.peek() == Some('"') {
            self.advance(1);
            Ok(Value::Known(v))
        } else {
            Err(self.err("Multi character operand too long ( > 4 )"))
        }
    }

    /// Binary literal after `%`: `1`/`*` are one bits, `0`/`.` zero bits,
    /// blanks are allowed as grouping.
    fn eval_binary_literal(&mut self) -> Value {
        let mut v: i32 = 0;
        while let Some(c) = self.peek() {
            match c {
                '1' | '*' => v = (v << 1) + 1,
                '0' | '.' => v <<= 1,
                ' ' => {}
                _ => break,
            }
            self.advance(1);
        }
        Value::Known(v)
    }

    fn eval_symbol(&mut self) -> Result<Value, AsmError> {
        let (name, rest) = get_symbol(self.rest, self.scope);
        let consumed = self.rest.len() - rest.len();
        let idx = self
            .symbols
            .find_or_create_ref(&name, self.pos.line, self.cpu)
            .map_err(|msg| {
                AsmError::symbol(
                    msg,
                    ErrorContext::with_caret(
                        self.pos.clone(),
                        self.origin,
                        self.origin.len() - self.rest.len(),
                    ),
                )
            })?;
        self.advance(consumed);
        let value = self.symbols.get(idx).value;
        self.symbols
            .record_ref(idx, self.pos.line, self.mode_tag, self.phase);
        Ok(value)
    }

    /// `?sym` yields the byte length of the data defined at `sym`.
    fn eval_symbol_bytes(&mut self) -> Result<Value, AsmError> {
        let (name, rest) = get_symbol(self.rest, self.scope);
        let consumed = self.rest.len() - rest.len();
        let known = self.symbols.find(&name);
        let idx = self
            .symbols
            .find_or_create_ref(&name, self.pos.line, self.cpu)
            .map_err(|msg| {
                AsmError::symbol(
                    msg,
                    ErrorContext::with_caret(
                        self.pos.clone(),
                        self.origin,
                        self.origin.len() - self.rest.len(),
                    ),
                )
            })?;
        self.advance(consumed);
        let value = if known.is_some() {
            Value::Known(self.symbols.get(idx).bytes as i32)
        } else {
            Value::Undefined
        };
        self.symbols
            .record_ref(idx, self.pos.line, self.mode_tag, self.phase);
        Ok(value)
    }
}
