//! asm9 command line driver.

mod date;
mod listing;
mod output;

use anyhow::{bail, Context, Result};
use asm9_core::{AsmOptions, Assembler, Cpu};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "asm9")]
#[command(about = "Two-pass cross-assembler for the Motorola 6809 / Hitachi 6309")]
#[command(version)]
struct Cli {
    /// Assembler source file (.as9 is appended when no extension is given)
    source: PathBuf,

    /// Target CPU (6809 or 6309)
    #[arg(short, long, default_value_t = 6309)]
    cpu: u32,

    /// Ignore case in symbols
    #[arg(short, long)]
    ignore_case: bool,

    /// Optimize long branches and jumps
    #[arg(short, long)]
    optimize: bool,

    /// Include line numbers in the listing
    #[arg(short = 'n', long)]
    line_numbers: bool,

    /// Quiet mode
    #[arg(short, long)]
    quiet: bool,

    /// Define a locked symbol, NAME or NAME=VALUE (may repeat)
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Preset value for the memory image
    #[arg(short = 'l', long, default_value_t = 0)]
    preset: u8,

    /// Stop assembly after this many errors
    #[arg(long, default_value_t = 10)]
    max_errors: usize,

    /// Listing file (defaults to the source base name with .lst)
    #[arg(long)]
    list: Option<PathBuf>,

    /// Write the symbol table snapshot as JSON
    #[arg(long)]
    symbols: Option<PathBuf>,
}

/// NAME or NAME=VALUE; a bare name defines the symbol as 1. Values are
/// decimal, $hex or 0xhex.
fn parse_define(text: &str) -> Result<(String, i32)> {
    let (name, value) = match text.split_once('=') {
        Some((name, value)) => (name, value),
        None => (text, "1"),
    };
    if name.is_empty() {
        bail!("empty symbol name in -D{}", text);
    }
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix('$') {
        i64::from_str_radix(hex, 16)
    } else if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    let v = parsed.with_context(|| format!("bad value in -D{}", text))?;
    Ok((name.to_string(), v as i32))
}

fn run(cli: &Cli) -> Result<usize> {
    let mut source_path = cli.source.clone();
    if source_path.extension().is_none() {
        source_path.set_extension("as9");
    }
    let source = fs::read_to_string(&source_path)
        .with_context(|| format!("could not open <{}>", source_path.display()))?;

    let Some(cpu) = Cpu::from_number(cli.cpu as i32) else {
        bail!("unknown CPU {} - use 6809 or 6309", cli.cpu);
    };
    let opts = AsmOptions {
        cpu,
        ignore_case: cli.ignore_case,
        optimize: cli.optimize,
        max_errors: cli.max_errors,
        preset: cli.preset,
        date: date::today(),
    };

    let mut asm = Assembler::new(opts);
    for def in &cli.defines {
        let (name, value) = parse_define(def)?;
        asm.define_symbol(&name, value);
    }

    let file_name = source_path.display().to_string();
    if let Err(e) = asm.assemble(&file_name, &source) {
        eprintln!("{}", e.report());
        for err in asm.errors() {
            eprintln!("{}", err.report());
        }
        return Ok(asm.error_count().max(1));
    }
    for err in asm.errors() {
        eprintln!("{}", err.report());
    }

    // listing with cross reference
    let list_path = cli
        .list
        .clone()
        .unwrap_or_else(|| source_path.with_extension("lst"));
    let mut list_file = fs::File::create(&list_path)
        .with_context(|| format!("could not create <{}>", list_path.display()))?;
    listing::write_listing(
        &mut list_file,
        asm.listing(),
        &asm.symbols().snapshot(),
        cli.line_numbers,
    )?;

    output::write_segments(asm.image(), asm.segments())?;

    if cli.optimize && !asm.hints().is_empty() {
        let opt_path = source_path.with_extension("opt");
        fs::write(&opt_path, asm.hints().join("\n") + "\n")?;
        if !cli.quiet {
            println!("hints : {} ({})", opt_path.display(), asm.hints().len());
        }
    }

    if let Some(path) = &cli.symbols {
        let json = serde_json::to_string_pretty(&asm.symbols().snapshot())?;
        fs::write(path, json)?;
    }

    if !cli.quiet {
        println!("source: {}", source_path.display());
        println!("list  : {}", list_path.display());
        println!("lines : {}", asm.total_lines());
        println!("symbols: {}", asm.symbols().len());
        println!("macros : {}", asm.macro_count());
        match asm.error_count() {
            0 => println!("OK, no errors"),
            n => println!("{} error(s) occurred", n),
        }
    }
    Ok(asm.error_count())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(errors) => ExitCode::from(errors.min(255) as u8),
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_define() {
        assert_eq!(parse_define("MO5").unwrap(), ("MO5".to_string(), 1));
        assert_eq!(parse_define("X=42").unwrap(), ("X".to_string(), 42));
        assert_eq!(parse_define("Y=$ff00").unwrap(), ("Y".to_string(), 0xff00));
        assert_eq!(parse_define("Z=0x10").unwrap(), ("Z".to_string(), 0x10));
        assert!(parse_define("=5").is_err());
        assert!(parse_define("B=oops").is_err());
    }
}
