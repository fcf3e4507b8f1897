//! Inter-register codes and push/pull register lists.

use crate::types::Cpu;

/// Register codes for EXG/TFR/ADDR-family postbytes (6309 set).
/// Codes 0-7 name 16-bit registers, 8-15 name 8-bit registers; code 13 is
/// the zero register and mixes with either size.
pub const REGISTERS_6309: [&str; 16] = [
    "D", "X", "Y", "U", "S", "PC", "W", "V", "A", "B", "CC", "DP", "*", "0", "E", "F",
];

/// The 6809 lacks W, V, E, F and the zero register.
pub const REGISTERS_6809: [&str; 16] = [
    "D", "X", "Y", "U", "S", "PC", "-", "-", "A", "B", "CC", "DP", "*", "*", "-", "-",
];

/// Code of the zero register, exempt from the EXG/TFR size-mix check.
pub const ZERO_REGISTER: usize = 13;

pub fn register_names(cpu: Cpu) -> &'static [&'static str; 16] {
    match cpu {
        Cpu::M6809 => &REGISTERS_6809,
        Cpu::H6309 => &REGISTERS_6309,
    }
}

/// Scan a register name at the start of `text`, preferring longer names
/// (DP before D, PC before any single letter). Returns the register code
/// and the remaining text with a trailing comma consumed.
pub fn scan_register(text: &str, cpu: Cpu) -> Option<(usize, &str)> {
    let names = register_names(cpu);
    for code in (0..16).rev() {
        let name = names[code];
        if name == "-" {
            continue;
        }
        let Some(prefix) = text.get(..name.len()) else {
            continue;
        };
        if prefix.eq_ignore_ascii_case(name) {
            let mut rest = text[name.len()..].trim_start();
            if let Some(r) = rest.strip_prefix(',') {
                rest = r;
            }
            return Some((code, rest));
        }
    }
    None
}

/// TFM accepts only D, X, Y, U, S (codes 0-4), named by a single letter.
pub fn tfm_register(text: &str, cpu: Cpu) -> Option<(usize, &str)> {
    let names = register_names(cpu);
    let first = text.chars().next()?;
    for code in (0..5).rev() {
        if names[code].starts_with(first.to_ascii_uppercase()) {
            return Some((code, &text[first.len_utf8()..]));
        }
    }
    None
}

/// Bit assignments of the PSHS/PULS/PSHU/PULU postbyte, scanned in reverse
/// so DP matches before D.
pub const PUSH_LIST: [(&str, u8); 10] = [
    ("CC", 0x01),
    ("A", 0x02),
    ("B", 0x04),
    ("D", 0x06),
    ("DP", 0x08),
    ("X", 0x10),
    ("Y", 0x20),
    ("S", 0x40),
    ("U", 0x40),
    ("PC", 0x80),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_register_prefers_long_names() {
        let (code, rest) = scan_register("DP,X", Cpu::H6309).unwrap();
        assert_eq!(code, 11);
        assert_eq!(rest, "X");
    }

    #[test]
    fn test_scan_register_cpu_restriction() {
        assert!(scan_register("W", Cpu::H6309).is_some());
        assert!(scan_register("W", Cpu::M6809).is_none());
    }

    #[test]
    fn test_tfm_register() {
        let (code, rest) = tfm_register("x+,y", Cpu::H6309).unwrap();
        assert_eq!(code, 1);
        assert_eq!(rest, "+,y");
        assert!(tfm_register("A,B", Cpu::H6309).is_none());
    }
}
