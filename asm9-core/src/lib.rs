//! Assembly engine for the Motorola 6809 / Hitachi 6309.
//!
//! A classic two-pass cross-assembler: phase 1 locks instruction lengths
//! and collects symbols, phase 2 re-walks the identical source and emits
//! the final bytes into a 64K memory image, validating every length
//! against what phase 1 locked. Output writing (raw binary, S-records,
//! the listing file) lives in the driver crate and consumes the plain
//! data this crate exposes: the memory image with its lock mask, the
//! segment descriptors, the symbol snapshot and the listing events.

pub mod assembler;
pub mod cond;
pub mod directives;
pub mod encoder;
pub mod expr;
pub mod image;
pub mod macros;
pub mod opcodes;
pub mod registers;
pub mod source;
pub mod symbols;
pub mod types;

pub use assembler::Assembler;
pub use image::MemoryImage;
pub use symbols::{SymbolKind, SymbolSnapshot, SymbolTable};
pub use types::{
    AddrMode, AsmOptions, Cpu, ListingLine, Phase, Segment, SegmentFormat, Value, IMAGE_SIZE,
    MEM_SIZE,
};

use asm9_common::AsmError;

/// Assemble a complete source text with the given options.
pub fn assemble(name: &str, source: &str, opts: AsmOptions) -> Result<Assembler, AsmError> {
    let mut asm = Assembler::new(opts);
    asm.assemble(name, source)?;
    Ok(asm)
}
