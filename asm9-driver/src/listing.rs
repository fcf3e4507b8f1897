//! Listing and cross-reference writer.
//!
//! Formats the listing events collected during phase 2 next to the
//! original source text, followed by the symbol table with reference
//! lines.

use asm9_core::{ListingLine, SymbolSnapshot};
use std::io::{self, Write};

/// Hex column width: up to five instruction bytes fit the layout.
const BYTE_COLUMNS: usize = 5;

pub fn write_listing(
    w: &mut impl Write,
    listing: &[ListingLine],
    symbols: &[SymbolSnapshot],
    with_line_numbers: bool,
) -> io::Result<()> {
    for line in listing {
        if with_line_numbers {
            write!(w, "{:5} ", line.line)?;
        }
        match line.addr {
            Some(addr) => write!(w, "{:04x} ", addr)?,
            None => write!(w, "     ")?,
        }
        let mut col = 0;
        for b in line.bytes.iter().take(BYTE_COLUMNS) {
            write!(w, "{:02x} ", b)?;
            col += 1;
        }
        for _ in col..BYTE_COLUMNS {
            write!(w, "   ")?;
        }
        write!(w, " {}", line.text)?;
        if let Some(note) = &line.note {
            write!(w, " {}", note)?;
        }
        writeln!(w)?;
    }

    writeln!(w)?;
    writeln!(w, "{:5} Symbols", symbols.len())?;
    writeln!(w, "-------------")?;
    write_cross_reference(w, symbols)?;
    Ok(())
}

/// Symbols sorted by address, each with the line numbers of its uses.
/// The defining reference is tagged with a D.
pub fn write_cross_reference(w: &mut impl Write, symbols: &[SymbolSnapshot]) -> io::Result<()> {
    let mut sorted: Vec<&SymbolSnapshot> = symbols.iter().collect();
    sorted.sort_by_key(|s| (s.value.unwrap_or(i32::MAX), s.name.clone()));

    for sym in sorted {
        match sym.value {
            Some(v) => write!(w, "{:<30} ${:04x}", sym.name, v & 0xffff)?,
            None => write!(w, "{:<30} -----", sym.name)?,
        }
        for (i, r) in sym.refs.iter().enumerate() {
            if i > 0 && i % 5 == 0 {
                write!(w, "\n{:36}", "")?;
            }
            let tag = if i == 0 { "D" } else { "" };
            write!(w, "{:6}{}", r.line, tag)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm9_core::{AsmOptions, Assembler};

    #[test]
    fn test_listing_columns() {
        let mut asm = Assembler::new(AsmOptions::default());
        asm.assemble("t.as9", "  ORG $E000\nStart LDA #10\n  STORE $E000,2,\"x.bin\"\n")
            .unwrap();
        let mut out = Vec::new();
        write_listing(&mut out, asm.listing(), &asm.symbols().snapshot(), true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("e000 86 0a"));
        assert!(text.contains("Start"));
        assert!(text.contains("$e000"));
    }
}
