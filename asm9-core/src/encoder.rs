//! Instruction encoder and addressing-mode resolver.
//!
//! Given a mnemonic table entry and the raw operand text, pick exactly one
//! addressing mode, compute opcode, optional postbyte and operand bytes,
//! and apply the branch optimizer. The selection order is load bearing:
//! immediate-to-memory forms first (they reuse direct/extended opcodes with
//! an embedded immediate byte), then inherent, register, relative,
//! immediate, indirect, bit operations, indexed, and finally
//! extended/direct.
//!
//! Phase 1 writes the opcode bytes and locks the instruction length; phase
//! 2 re-reads both where a decision must not be re-derived (direct vs
//! extended, a JMP already shrunk to BRA) and pads with NOPs when the
//! optimizer settles on a shorter form than the locked length.

use crate::assembler::{strip_keyword, Assembler};
use crate::opcodes::Mnemonic;
use crate::registers::{self, PUSH_LIST, ZERO_REGISTER};
use crate::types::{AddrMode, ForcedMode, Phase, Value, NOP};
use asm9_common::AsmError;

impl Assembler {
    pub(crate) fn generate_code(
        &mut self,
        mne: &'static Mnemonic,
        optext: &str,
    ) -> Result<(), AsmError> {
        let pc = self.pc_required()?;
        let pcu = pc as usize;

        let mut v = Value::Undefined;
        let mut pb: Option<u8> = None;
        let mut ql: i32 = 0;
        let mut ol: i32;
        let mut il: i32;
        let mut oc: u16;
        let mut xim_imm: Option<Value> = None;
        let mut note: Option<String> = None;
        let mut rest: &str = optext;

        // immediate-to-memory pseudo modes (OIM/AIM/EIM/TIM) carry an
        // embedded immediate byte and are detected before anything else
        if mne.is_xim() {
            let Some(r) = rest.strip_prefix('#') else {
                return Err(self.enc_err("Immediate operand must start with '#'"));
            };
            self.mode_tag = Some(AddrMode::Immediate);
            let (iv, r) = self.eval_operand(r)?;
            xim_imm = Some(iv);
            let Some(r) = r.strip_prefix(',') else {
                return Err(self.enc_err("Immediate value must be followed by comma"));
            };
            rest = r;
        }

        if let Some(op) = mne.opcode(AddrMode::Inherent) {
            // inherent: no operand bytes, trailing text ignored
            oc = op;
            ol = 1 + (oc > 255) as i32;
            il = ol;
        } else if optext.is_empty() {
            return Err(self.enc_err("Missing operand"));
        } else if optext.starts_with('\'') {
            return Err(self.enc_err("Operand cannot start with apostrophe"));
        } else if let Some(op) = mne.opcode(AddrMode::Register) {
            oc = op;
            self.mode_tag = Some(AddrMode::Register);
            if mne.name.starts_with('P') {
                // PSHS PULS PSHU PULU
                ol = 1 + (oc > 255) as i32;
                il = ol + 1;
                pb = Some(self.scan_push_list(rest)?);
            } else if mne.name.starts_with("TFM") {
                ol = 1 + (oc > 255) as i32;
                il = ol + 1;
                let Some((r1, q)) = registers::tfm_register(rest, self.cpu) else {
                    return Err(
                        self.enc_err("Illegal register name for TFM or wrong CPU set")
                    );
                };
                let mut q = q;
                let mut p1 = 0u8;
                if q.starts_with('+') || q.starts_with('-') {
                    p1 = q.as_bytes()[0];
                    q = &q[1..];
                }
                let Some(q) = q.strip_prefix(',') else {
                    return Err(self.enc_err("Missing comma"));
                };
                let Some((r2, q)) = registers::tfm_register(q, self.cpu) else {
                    return Err(
                        self.enc_err("Illegal register name for TFM or wrong CPU set")
                    );
                };
                let mut p2 = 0u8;
                if q.starts_with('+') || q.starts_with('-') {
                    p2 = q.as_bytes()[0];
                }
                pb = Some(((r1 as u8) << 4) | r2 as u8);
                oc = match (p1, p2) {
                    (b'+', b'+') => 0x1138,
                    (b'-', b'-') => 0x1139,
                    (b'+', 0) => 0x113a,
                    (0, b'+') => 0x113b,
                    _ => {
                        return Err(self.enc_err("Illegal increment/decrement combination"))
                    }
                };
            } else {
                // EXG TFR and the 6309 inter-register arithmetic group
                ol = 1 + (oc > 255) as i32;
                il = ol + 1;
                let Some((r1, q)) = registers::scan_register(rest, self.cpu) else {
                    return Err(self.enc_err("Unknown register name or wrong CPU set"));
                };
                let Some((r2, _)) = registers::scan_register(q, self.cpu) else {
                    return Err(self.enc_err("Unknown register name or wrong CPU set"));
                };
                if r1 != ZERO_REGISTER
                    && r2 != ZERO_REGISTER
                    && ((r1 < 8) != (r2 < 8))
                {
                    let names = registers::register_names(self.cpu);
                    return Err(self.enc_err(format!(
                        "mixing register of different sizes: {} is {} bit, {} is {} bit",
                        names[r1],
                        if r1 < 8 { 16 } else { 8 },
                        names[r2],
                        if r2 < 8 { 16 } else { 8 },
                    )));
                }
                pb = Some(((r1 as u8) << 4) | r2 as u8);
            }
        } else if let Some(op) = mne.opcode(AddrMode::Relative) {
            oc = op;
            self.mode_tag = Some(AddrMode::Relative);
            ol = 1 + (oc > 255) as i32;
            ql = 1 + mne.name.starts_with('L') as i32;
            il = ol + ql;

            let target = self.branch_target(optext, pc)?;
            let mut disp = target.map(|t| t.wrapping_sub(pc + il));
            if self.phase == Phase::Two && disp.is_undefined() {
                return Err(self.enc_err("Branch to undefined label"));
            }

            if self.opts.optimize {
                let locked = self.image.locked_length(pcu) as i32;
                let d = disp.known();

                // widen a short conditional branch that cannot reach
                if matches!(d, Some(d) if d < -128)
                    && (0x20..0x30).contains(&oc)
                    && (self.phase == Phase::One
                        || (self.phase == Phase::Two && locked >= 3))
                {
                    if oc == 0x20 {
                        oc = 0x16; // BRA -> LBRA
                        ol = 1;
                    } else {
                        oc |= 0x1000;
                        ol = 2;
                    }
                    ql = 2;
                    il = ol + ql;
                }

                // shrink a long conditional branch that fits
                if matches!(d, Some(d) if (-128..0).contains(&d))
                    && oc > 0x1020
                    && oc < 0x1030
                    && (self.phase == Phase::One
                        || (self.phase == Phase::Two && locked == 2))
                {
                    oc &= 0xff;
                    ol = 1;
                    ql = 1;
                    il = 2;
                    if self.phase == Phase::Two {
                        let short = &mne.name[1..];
                        self.hints.push(format!(
                            "{:>4} {:04x}   -->   {:>3}:{:5} {}",
                            mne.name,
                            d.unwrap_or(0) & 0xffff,
                            short,
                            self.line_no,
                            self.line
                        ));
                        note = Some(format!("; {}", short));
                    }
                }

                // LBRA shrinks exactly like the conditional forms
                if matches!(d, Some(d) if (-128..0).contains(&d))
                    && oc == 0x16
                    && (self.phase == Phase::One
                        || (self.phase == Phase::Two && locked == 2))
                {
                    oc = 0x20;
                    ol = 1;
                    ql = 1;
                    il = 2;
                }
            }

            // the displacement is relative to the final instruction length
            disp = target.map(|t| t.wrapping_sub(pc + il));
            if self.phase == Phase::Two {
                if let Some(d) = disp.known() {
                    if ql == 1 && !(-128..=127).contains(&d) {
                        return Err(self.enc_err(format!(
                            "Short Branch out of range ({})",
                            d
                        )));
                    }
                    if self.opts.optimize && ql == 2 && (-128..128).contains(&d) {
                        self.hints.push(format!(
                            "{:>4} {:04x}   ***   {:>3}:{:5} {}",
                            mne.name,
                            d & 0xffff,
                            &mne.name[1..],
                            self.line_no,
                            self.line
                        ));
                    }
                }
            }
            v = disp.map(|d| d & 0xffff);
        } else if rest.starts_with('#') {
            self.mode_tag = Some(AddrMode::Immediate);
            let Some(op) = mne.opcode(AddrMode::Immediate) else {
                return Err(self.enc_err(format!(
                    "Illegal immediate instruction {} {}",
                    mne.name, optext
                )));
            };
            oc = op;
            let (val, r) = self.eval_operand(&rest[1..])?;
            if !r.is_empty() {
                return Err(self.syn_err("Extra text after operand"));
            }
            v = val;
            ol = 1 + (oc > 255) as i32;
            ql = self.register_size(mne)?;
            if ql == 4 && oc != 0xcd {
                ql = 2; // only LDQ immediate carries a 32 bit value
            }
            il = ol + ql;
            if self.phase == Phase::Two {
                let Some(x) = v.known() else {
                    return Err(self.enc_err("Undefined immediate value"));
                };
                if ql == 1 && !(-128..=255).contains(&x) {
                    return Err(
                        self.enc_err(format!("Immediate value out of range ({})", x))
                    );
                }
                if ql == 2 && !(-32768..=0xffff).contains(&x) {
                    return Err(
                        self.enc_err(format!("Immediate value out of range ({})", x))
                    );
                }
            }
        } else if optext.starts_with('[') {
            if !optext.ends_with(']') {
                return Err(self.syn_err("Missing closing bracket ]"));
            }
            self.mode_tag = Some(AddrMode::Indexed);
            let Some(op) = mne.opcode(AddrMode::Indexed) else {
                return Err(self.enc_err(format!(
                    "Illegal instruction {} {}",
                    mne.name, optext
                )));
            };
            oc = op;
            ol = 1 + (oc > 255) as i32;
            if !optext[1..].contains(',') {
                // indirect absolute address
                let (val, _) = self.eval_operand(&optext[1..])?;
                v = val;
                pb = Some(0x9f);
                ql = 2;
                il = ol + 3;
            } else {
                let (b, val, q) = self.set_post_byte(optext, pc)?;
                pb = Some(b | 0x10);
                v = val;
                ql = q;
                il = ol + 1 + ql;
            }
        } else if rest.contains(',') && rest.contains('.') {
            // register / direct-page bit operations: A.3,FLAG.5
            self.mode_tag = Some(AddrMode::Direct);
            let Some(op) = mne.opcode(AddrMode::Direct) else {
                return Err(self.enc_err(format!(
                    "Illegal bit operation {} {}",
                    mne.name, optext
                )));
            };
            oc = op;
            let (mut pbv, t) = if rest.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("CC."))
            {
                (0x00u8, &rest[3..])
            } else if rest.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("A.")) {
                (0x40, &rest[2..])
            } else if rest.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("B.")) {
                (0x80, &rest[2..])
            } else {
                return Err(self.enc_err(format!(
                    "Illegal register in bit operation {} {}",
                    mne.name, optext
                )));
            };
            let target_bit = t.chars().next().and_then(|c| c.to_digit(10));
            let Some(bit) = target_bit.filter(|&b| b < 8) else {
                return Err(self.enc_err("Illegal bit number (use 0-7)"));
            };
            pbv |= bit as u8;
            let t = &t[1..];
            let Some(ci) = t.find(',') else {
                return Err(self.syn_err("Illegal syntax in bit operand"));
            };
            let after = &t[ci + 1..];
            let Some(di) = after.rfind('.') else {
                return Err(self.syn_err("Illegal syntax in bit operand"));
            };
            let (addr, _) = self.eval_operand(&after[..di])?;
            if matches!(addr.known(), Some(a) if !(0..=255).contains(&a)) {
                return Err(self.enc_err(format!(
                    "Illegal address {} for bit operation",
                    addr.hex()
                )));
            }
            v = addr;
            let source_bit = after[di + 1..].chars().next().and_then(|c| c.to_digit(10));
            let Some(bit) = source_bit.filter(|&b| b < 8) else {
                return Err(self.enc_err("Illegal bit number (use 0-7)"));
            };
            pbv |= (bit as u8) << 3;
            pb = Some(pbv);
            ol = 2;
            ql = 1;
            il = 4;
        } else if rest.contains(',') {
            self.mode_tag = Some(AddrMode::Indexed);
            let Some(op) = mne.opcode(AddrMode::Indexed) else {
                return Err(self.enc_err(format!(
                    "Illegal indexed instruction {} {}",
                    mne.name, optext
                )));
            };
            oc = op;
            let (b, val, q) = self.set_post_byte(rest, pc)?;
            pb = Some(b);
            v = val;
            ql = q;
            ol = if xim_imm.is_some() {
                2
            } else {
                1 + (oc > 255) as i32
            };
            il = ol + 1 + ql;
        } else {
            // extended or direct
            self.mode_tag = Some(AddrMode::Extended);
            let (val, _) = self.eval_operand(rest)?;
            v = val;

            if xim_imm.is_some() {
                ol = 2; // opcode plus embedded immediate
                if self.phase == Phase::Two {
                    il = self.image.locked_length(pcu) as i32;
                    ql = il - ol;
                    oc = if ql == 1 {
                        mne.opcode(AddrMode::Direct).unwrap_or_default()
                    } else {
                        mne.opcode(AddrMode::Extended).unwrap_or_default()
                    };
                } else {
                    match v.known() {
                        Some(x) if x <= 255 => {
                            oc = mne.opcode(AddrMode::Direct).unwrap_or_default();
                            ql = 1;
                        }
                        _ => {
                            oc = mne.opcode(AddrMode::Extended).unwrap_or_default();
                            ql = 2;
                        }
                    }
                    il = ol + ql;
                }
            } else if self.phase == Phase::Two {
                // the direct/extended decision was taken in phase 1: read
                // the opcode from the image and the length from the lock
                // table instead of re-deriving it
                let b0 = self.image.byte(pcu);
                ol = 1 + (b0 == 0x10 || b0 == 0x11) as i32;
                oc = if ol == 2 {
                    ((b0 as u16) << 8) | self.image.byte(pcu + 1) as u16
                } else {
                    b0 as u16
                };
                il = self.image.locked_length(pcu) as i32;
                ql = il - ol;
            } else {
                let Some(ext) = mne.opcode(AddrMode::Extended) else {
                    return Err(self.enc_err(format!(
                        "Illegal instruction {} {}",
                        mne.name, optext
                    )));
                };
                oc = ext;
                ol = 1 + (oc > 255) as i32;
                ql = 2;
                il = ol + 2;
                if self.forced != ForcedMode::Extended {
                    if let Some(dir) = mne.opcode(AddrMode::Direct) {
                        let on_page =
                            matches!(v.known(), Some(x) if (x >> 8) == self.dp);
                        if self.forced == ForcedMode::Direct || on_page {
                            oc = dir;
                            v = v.map(|x| x & 0xff);
                            ql = 1;
                            il = ol + 1;
                        }
                    }
                }
            }

            // JSR -> BSR is reported only; JMP -> BRA is substituted in
            // phase 1 and recognized back from the image in phase 2
            let mut bra_substituted = false;
            if self.opts.optimize {
                if let Some(target) = v.known() {
                    let rd = target - pc - 3;
                    if self.phase == Phase::Two
                        && oc == 0xbd
                        && (-128..128).contains(&rd)
                    {
                        self.hints.push(format!(
                            " JSR {:04x}   ***   BSR {:02x}:{:5} {}",
                            target,
                            rd & 0xff,
                            self.line_no,
                            self.line
                        ));
                    }
                    if (-128..0).contains(&rd) {
                        if self.phase == Phase::One && oc == 0x7e {
                            oc = 0x20; // JMP -> BRA
                            ol = 1;
                            ql = 1;
                            il = 2;
                            v = Value::Known((target - pc - 2) & 0xffff);
                            bra_substituted = true;
                        }
                        if self.phase == Phase::Two && oc == 0x20 {
                            self.hints.push(format!(
                                " JMP {:04x}   -->   BRA {:02x}:{:5} {}",
                                target,
                                (target - pc - 2) & 0xff,
                                self.line_no,
                                self.line
                            ));
                            note = Some("; BRA".to_string());
                            ol = 1;
                            ql = 1;
                            il = 2;
                            v = Value::Known((target - pc - 2) & 0xffff);
                            bra_substituted = true;
                        }
                    }
                }
            }

            // direct-page operands shrink to their low byte; a branch the
            // optimizer substituted keeps its displacement
            if xim_imm.is_none()
                && self.phase == Phase::Two
                && !bra_substituted
                && (self.forced == ForcedMode::Direct || ql == 1)
            {
                v = v.map(|x| x & 0xff);
            }
        }

        // ----- phase 1: lock the length, stage the opcode bytes -----

        if self.phase == Phase::One {
            if oc > 255 {
                self.put(pc, (oc >> 8) as u8)?;
                self.put(pc + 1, oc as u8)?;
            } else {
                self.put(pc, oc as u8)?;
            }
            if let Err(e) = self.image.lock_length(pcu, il as i8) {
                log::debug!("length lock failed: {:?}", e);
                return Err(self.phase_err("Phase error"));
            }
        }

        // ----- phase 2: synchronize and emit -----

        let mut nops: i32 = 0;
        if self.phase == Phase::Two {
            let locked = self.image.locked_length(pcu) as i32;
            nops = locked - il;
            if nops < 0 {
                return Err(self.phase_err(format!(
                    "Phase error: instruction length {} exceeds locked length {}",
                    il, locked
                )));
            }
            il = locked;
            if nops > 0 {
                // phase 1 reserved a longer form; the opcode byte may
                // legitimately change
                self.image.unlock(pcu);
            }
            if v.is_undefined() && ql > 0 {
                return Err(self.sym_err("Use of an undefined label"));
            }

            let mut ibi: i32;
            if oc > 255 {
                self.put(pc, (oc >> 8) as u8)?;
                self.put(pc + 1, oc as u8)?;
                ibi = 2;
            } else {
                self.put(pc, oc as u8)?;
                ibi = 1;
            }
            if let Some(imm) = xim_imm {
                let Some(x) = imm.known() else {
                    return Err(self.enc_err("Undefined immediate value"));
                };
                self.put(pc + ibi, x as u8)?;
                ibi += 1;
            }
            if let Some(b) = pb {
                self.put(pc + ibi, b)?;
                ibi += 1;
            }
            let x = v.known().unwrap_or(0);
            match ql {
                4 => {
                    for byte in (x as u32).to_be_bytes() {
                        self.put(pc + ibi, byte)?;
                        ibi += 1;
                    }
                }
                2 => {
                    if !(-32768..=0xffff).contains(&x) {
                        return Err(self.enc_err("16 bit address/value out of range"));
                    }
                    self.put(pc + ibi, (x >> 8) as u8)?;
                    self.put(pc + ibi + 1, x as u8)?;
                    ibi += 2;
                }
                1 => {
                    let mut x = x;
                    if (0xff00..=0xffff).contains(&x) {
                        x &= 0xff;
                    }
                    let paged = x - (self.dp << 8);
                    if (-128..256).contains(&paged) {
                        x = paged;
                    }
                    if !(-128..=255).contains(&x) {
                        return Err(self.enc_err("8 bit address/value out of range"));
                    }
                    self.put(pc + ibi, x as u8)?;
                    ibi += 1;
                }
                _ => {}
            }
            for i in 0..nops {
                self.put(pc + ibi + i, NOP)?;
            }

            if nops > 0 {
                let extra = if nops == 1 {
                    "; added a NOP".to_string()
                } else {
                    format!("; added {} NOP's", nops)
                };
                note = Some(match note {
                    Some(n) => format!("{} {}", n, extra),
                    None => extra,
                });
            }
            let bytes: Vec<u8> = (0..il as usize).map(|i| self.image.byte(pcu + i)).collect();
            self.listing_push(Some(pc as u16), bytes, note);
        }

        if !(1..=5).contains(&il) {
            self.reporter
                .report(self.enc_err(format!("Wrong instruction length = {}", il)));
            il = 1;
        }
        if pc + il > 0xffff {
            if self.phase == Phase::Two {
                self.reporter
                    .report(self.str_err("Program counter exceeds 64 KB"));
            }
        } else {
            self.pc = Value::Known(pc + il);
        }
        Ok(())
    }

    /// Resolve a branch target: a run of `-` or `+` is a local anonymous
    /// label, anything else is an expression.
    fn branch_target(&mut self, optext: &str, pc: i32) -> Result<Value, AsmError> {
        if optext.starts_with('-') {
            if optext.chars().all(|c| c == '-') {
                let run = optext.len().min(crate::types::LOCAL_RUN_MAX);
                return Ok(self.local.backward(run));
            }
            let (val, r) = self.eval_operand(optext)?;
            if !r.is_empty() {
                return Err(self.syn_err("Extra text after branch operand"));
            }
            return Ok(val);
        }
        if optext.starts_with('+') && optext.chars().all(|c| c == '+') {
            let run = optext.len().min(crate::types::LOCAL_RUN_MAX);
            return Ok(self.local.resolve_forward(run, pc));
        }
        let (val, _) = self.eval_operand(optext)?;
        Ok(val)
    }

    /// Immediate operand width from the mnemonic's trailing register
    /// letter.
    fn register_size(&self, mne: &Mnemonic) -> Result<i32, AsmError> {
        if mne.name == "LDMD" || mne.name == "CWAI" {
            return Ok(1);
        }
        let last = mne.name.chars().last().unwrap_or(' ');
        match last {
            'A' | 'B' | 'C' | 'E' | 'F' => Ok(1),
            'D' | 'X' | 'Y' | 'W' | 'S' | 'U' => Ok(2),
            'Q' => Ok(4),
            _ => Err(self.enc_err(format!("Illegal register name [{}]", last))),
        }
    }

    fn operand_error(&self) -> AsmError {
        self.syn_err("Syntax error in operand")
    }

    /// PSHS/PULS/PSHU/PULU register list, packed into the postbyte.
    fn scan_push_list(&mut self, text: &str) -> Result<u8, AsmError> {
        let t = text.trim();
        if strip_keyword(t, "ALL").is_some() {
            return Ok(0xff);
        }
        let mut v = 0u8;
        let mut rest = t;
        while !rest.is_empty() {
            let mut matched = None;
            // scan DP before D
            for &(name, val) in PUSH_LIST.iter().rev() {
                if let Some(r) = strip_keyword(rest, name) {
                    matched = Some((val, r));
                    break;
                }
            }
            let Some((val, r)) = matched else {
                return Err(self.operand_error());
            };
            v |= val;
            let r = r.trim_start();
            if !r.is_empty() && !r.starts_with(',') {
                return Err(self.operand_error());
            }
            rest = r.strip_prefix(',').unwrap_or(r).trim_start();
        }
        Ok(v)
    }

    /// Compute the indexed-mode postbyte. Returns (postbyte, operand
    /// value, operand byte count). `text` may carry the indirect
    /// brackets.
    fn set_post_byte(&mut self, text: &str, pc: i32) -> Result<(u8, Value, i32), AsmError> {
        let mut ind: u8 = 0;
        let mut t = text;
        if t.len() >= 2 && t.starts_with('[') && t.ends_with(']') {
            ind = 0x10;
            t = &t[1..t.len() - 1];
        }

        // accumulator-offset forms A,R B,R D,R E,R F,R W,R
        let bytes = t.as_bytes();
        if bytes.len() > 2 && bytes[1] == b',' {
            let code = match bytes[0].to_ascii_uppercase() {
                b'A' => Some(0x06u8),
                b'B' => Some(0x05),
                b'D' => Some(0x0b),
                b'E' => Some(0x07),
                b'F' => Some(0x0a),
                b'W' => Some(0x0e),
                _ => None,
            };
            if let Some(code) = code {
                let reg = self.post_index_reg(&t[2..])?;
                return Ok((0x80 | reg | ind | code, Value::Undefined, 0));
            }
        }

        // PC relative
        let upper = t.to_ascii_uppercase();
        if (t.len() > 4 && upper.ends_with(",PCR")) || (t.len() > 3 && upper.ends_with(",PC"))
        {
            let (off, _) = self.eval_operand(t)?;
            let off = off.map(|o| o - (pc + 3));
            let fits = matches!(off.known(), Some(o) if (-128..128).contains(&o));
            if self.forced == ForcedMode::Direct
                || (fits && self.image.byte(pc as usize) != 0x8d)
            {
                return Ok((0x8c | ind, off, 1));
            }
            return Ok((0x8d | ind, off.map(|o| o - 1), 2));
        }

        // leading offset expression, if any
        let mut off = Value::Known(0);
        let mut rest = t;
        if !t.starts_with(',') {
            let (o, r) = self.eval_operand(t)?;
            off = o;
            rest = r;
        }

        if rest.starts_with(',') && off == Value::Known(0) {
            // zero offset, optionally auto increment/decrement
            let mut q = &rest[1..];
            let mut dec = 0;
            while let Some(r) = q.strip_prefix('-') {
                dec += 1;
                q = r;
            }
            let (is_w, reg) = match q.chars().next().map(|c| c.to_ascii_uppercase()) {
                Some('W') => (true, 0u8),
                Some('X') => (false, 0x00),
                Some('Y') => (false, 0x20),
                Some('U') => (false, 0x40),
                Some('S') => (false, 0x60),
                _ => return Err(self.operand_error()),
            };
            q = &q[1..];
            let mut inc = 0;
            while let Some(r) = q.strip_prefix('+') {
                inc += 1;
                q = r;
            }
            let amo: u8 = match (inc, dec) {
                (1, 0) => 0x00,
                (2, 0) => 0x01,
                (0, 1) => 0x02,
                (0, 2) => 0x03,
                (0, 0) => 0x04,
                _ => return Err(self.operand_error()),
            };
            if is_w {
                // the W zero-offset forms use fixed postbyte codes
                let base: u8 = match amo {
                    0x04 => 0x8f, // ,W
                    0x01 => 0xcf, // ,W++
                    0x03 => 0xef, // ,--W
                    _ => return Err(self.operand_error()),
                };
                return Ok((base + u8::from(ind != 0), Value::Undefined, 0));
            }
            return Ok((0x80 | reg | ind | amo, Value::Undefined, 0));
        }

        if rest.starts_with(',') {
            // constant offset
            let q = &rest[1..];
            let reg = match q.chars().next().map(|c| c.to_ascii_uppercase()) {
                Some('W') => {
                    // n,W always takes a 16 bit offset
                    return Ok((if ind != 0 { 0xb0 } else { 0xaf }, off, 2));
                }
                Some('X') => 0x00u8,
                Some('Y') => 0x20,
                Some('U') => 0x40,
                Some('S') => 0x60,
                _ => return Err(self.operand_error()),
            };
            if self.forced != ForcedMode::Extended
                && ind == 0
                && matches!(off.known(), Some(o) if (-16..16).contains(&o))
            {
                let bits = (off.known().unwrap_or(0) & 0x1f) as u8;
                return Ok((reg | bits, off, 0));
            }
            let fits8 = matches!(off.known(), Some(o) if (-128..128).contains(&o));
            if self.forced == ForcedMode::Direct || fits8 {
                return Ok((0x80 | reg | ind | 0x08, off, 1));
            }
            return Ok((0x80 | reg | ind | 0x09, off, 2));
        }

        Err(self.operand_error())
    }

    /// Index register of an accumulator-offset form; nothing may follow.
    fn post_index_reg(&self, text: &str) -> Result<u8, AsmError> {
        let mut chars = text.chars();
        let reg = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('X') => 0x00,
            Some('Y') => 0x20,
            Some('U') => 0x40,
            Some('S') => 0x60,
            _ => return Err(self.operand_error()),
        };
        if chars.next().is_some() {
            return Err(self.operand_error());
        }
        Ok(reg)
    }
}
