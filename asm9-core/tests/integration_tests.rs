use asm9_core::{AsmOptions, Assembler, Cpu, Value};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn assemble(source: &str) -> Assembler {
    assemble_with(source, AsmOptions::default())
}

fn assemble_with(source: &str, opts: AsmOptions) -> Assembler {
    let mut asm = Assembler::new(opts);
    match asm.assemble("test.as9", source) {
        Ok(()) => asm,
        Err(e) => panic!("assembly failed: {}", e.report()),
    }
}

fn assemble_err(source: &str) -> String {
    assemble_err_with(source, AsmOptions::default())
}

fn assemble_err_with(source: &str, opts: AsmOptions) -> String {
    let mut asm = Assembler::new(opts);
    match asm.assemble("test.as9", source) {
        Ok(()) => panic!("assembly unexpectedly succeeded"),
        Err(e) => format!("{}", e),
    }
}

fn bytes(asm: &Assembler, start: usize, len: usize) -> Vec<u8> {
    asm.image().rom()[start..start + len].to_vec()
}

#[test]
fn test_lda_immediate_at_e000() {
    let asm = assemble("  ORG $E000\n  LDA #10\n");
    assert_eq!(bytes(&asm, 0xE000, 2), vec![0x86, 0x0A]);
    assert!(asm.image().is_locked(0xE000));
    assert!(asm.image().is_locked(0xE001));
    assert!(!asm.image().is_locked(0xE002));
    assert_eq!(asm.error_count(), 0);
}

#[test]
fn test_immediate_width_by_register_letter() {
    let asm = assemble(indoc! {"
          ORG $1000
          LDB #$41
          LDX #$1234
          CMPD #$5678
          LDQ #$11223344
          ANDCC #$FE
    "});
    assert_eq!(
        bytes(&asm, 0x1000, 15),
        vec![
            0xC6, 0x41, // LDB #
            0x8E, 0x12, 0x34, // LDX #
            0x10, 0x83, 0x56, 0x78, // CMPD #
            0xCD, 0x11, 0x22, 0x33, 0x44, // LDQ # (the only 32 bit form)
            0x1C, // ANDCC opcode
        ]
    );
    assert_eq!(asm.image().rom()[0x100F], 0xFE);
}

#[test]
fn test_direct_vs_extended_by_direct_page() {
    let asm = assemble(indoc! {"
          ORG $2000
          SETDP $20
          LDA $2055
          LDA $3055
          LDA <$55
          LDA >$0055
    "});
    assert_eq!(
        bytes(&asm, 0x2000, 10),
        vec![
            0x96, 0x55, // high byte matches DP: direct
            0xB6, 0x30, 0x55, // extended
            0x96, 0x55, // forced direct
            0xB6, 0x00, 0x55, // forced extended
        ]
    );
}

#[test]
fn test_inherent_and_two_byte_opcodes() {
    let asm = assemble("  ORG 0\n  NOP\n  SWI2\n  SWI3\n  SEXW\n");
    assert_eq!(bytes(&asm, 0, 6), vec![0x12, 0x10, 0x3F, 0x11, 0x3F, 0x14]);
}

#[test]
fn test_forward_branch_resolves() {
    let asm = assemble(indoc! {"
          ORG $1000
          BRA Skip
          NOP
        Skip RTS
    "});
    assert_eq!(bytes(&asm, 0x1000, 4), vec![0x20, 0x01, 0x12, 0x39]);
}

#[test]
fn test_backward_branch_displacement() {
    let asm = assemble(indoc! {"
          ORG $1000
        Loop NOP
          BNE Loop
    "});
    // displacement = $1000 - ($1001 + 2) = -3
    assert_eq!(bytes(&asm, 0x1000, 3), vec![0x12, 0x26, 0xFD]);
}

#[test]
fn test_long_branch() {
    let asm = assemble(indoc! {"
          ORG $1000
        Back NOP
          LBEQ Back
    "});
    // displacement = $1000 - ($1001 + 4) = -5
    assert_eq!(bytes(&asm, 0x1001, 4), vec![0x10, 0x27, 0xFF, 0xFB]);
}

#[test]
fn test_local_anonymous_labels() {
    let asm = assemble(indoc! {"
          ORG $1000
          LDA #1
        - NOP
          BRA -
          BRA +
        + RTS
    "});
    assert_eq!(
        bytes(&asm, 0x1000, 8),
        vec![0x86, 0x01, 0x12, 0x20, 0xFD, 0x20, 0x00, 0x39]
    );
}

#[test]
fn test_short_branch_out_of_range_is_fatal() {
    let err = assemble_err(indoc! {"
          ORG 0
          BRA Far
          FILL 300 (0)
        Far NOP
    "});
    assert!(err.contains("Short Branch out of range"), "{}", err);
}

#[test]
fn test_register_modes() {
    let asm = assemble(indoc! {"
          ORG 0
          TFR A,B
          EXG X,Y
          PSHS A,B,X
          PULS ALL
          ADDR A,B
          TFM X+,Y+
          TFM X,Y+
    "});
    assert_eq!(
        bytes(&asm, 0, 16),
        vec![
            0x1F, 0x89, // TFR A,B
            0x1E, 0x12, // EXG X,Y
            0x34, 0x16, // PSHS A,B,X
            0x35, 0xFF, // PULS ALL
            0x10, 0x30, 0x89, // ADDR A,B
            0x11, 0x38, 0x12, // TFM X+,Y+
            0x11, 0x3B, // TFM X,Y+ -> variant 0x113b
        ]
    );
    assert_eq!(asm.image().rom()[16], 0x12);
}

#[test]
fn test_register_size_mix_rejected() {
    let err = assemble_err("  ORG 0\n  EXG A,X\n");
    assert!(err.contains("mixing register"), "{}", err);
}

#[test]
fn test_indexed_postbytes() {
    let asm = assemble(indoc! {"
          ORG $4000
          LDA ,X
          LDA ,X+
          LDA ,X++
          LDA ,-Y
          LDA ,--Y
          LDA 5,U
          LDA -1,S
          LDA 100,X
          LDA $200,X
          LDA A,Y
          LDA D,X
          LDA [$1234]
          LDA [5,X]
          LEAX ,W
          LDA ,W++
          LDA 10,W
    "});
    assert_eq!(
        bytes(&asm, 0x4000, 32),
        vec![
            0xA6, 0x84, // ,X
            0xA6, 0x80, // ,X+
            0xA6, 0x81, // ,X++
            0xA6, 0xA2, // ,-Y
            0xA6, 0xA3, // ,--Y
            0xA6, 0x45, // 5,U (5 bit)
            0xA6, 0x7F, // -1,S (5 bit)
            0xA6, 0x88, 0x64, // 100,X (8 bit)
            0xA6, 0x89, 0x02, 0x00, // $200,X (16 bit)
            0xA6, 0xA6, // A,Y
            0xA6, 0x8B, // D,X
            0xA6, 0x9F, 0x12, 0x34, // [$1234]
            0xA6, 0x98, 0x05, // [5,X]
        ]
    );
    assert_eq!(bytes(&asm, 0x4020, 4), vec![0x30, 0x8F, 0xA6, 0xCF]);
    assert_eq!(bytes(&asm, 0x4024, 4), vec![0xA6, 0xAF, 0x00, 0x0A]);
}

#[test]
fn test_pc_relative_indexed() {
    let asm = assemble(indoc! {"
          ORG $5000
        Msg FCB 1,2,3,4
          LEAX Msg,PCR
    "});
    // postbyte 8C, 8 bit offset = $5000 - ($5004 + 3) = -7
    assert_eq!(bytes(&asm, 0x5004, 3), vec![0x30, 0x8C, 0xF9]);
}

#[test]
fn test_bit_operations() {
    let asm = assemble(indoc! {"
          ORG 0
        FLAG EQU $40
          BAND A.3,FLAG.5
          LDBT CC.0,$20.7
    "});
    // postbyte = register | source_bit << 3 | target_bit
    assert_eq!(
        bytes(&asm, 0, 8),
        vec![0x11, 0x30, 0x6B, 0x40, 0x11, 0x36, 0x38, 0x20]
    );
}

#[test]
fn test_xim_immediate_to_memory() {
    let asm = assemble(indoc! {"
          ORG $1000
          OIM #$55,$10
          AIM #$0F,$1234
          EIM #1,5,X
          TIM #$80,[$20,Y]
    "});
    assert_eq!(
        bytes(&asm, 0x1000, 14),
        vec![
            0x01, 0x55, 0x10, // OIM direct
            0x72, 0x0F, 0x12, 0x34, // AIM extended
            0x65, 0x01, 0x05, // EIM indexed, 5 bit offset
            0x6B, 0x80, 0xB8, 0x20, // TIM indexed indirect, 8 bit offset
        ]
    );
}

#[test]
fn test_6309_mnemonics_rejected_on_6809() {
    let opts = AsmOptions {
        cpu: Cpu::M6809,
        ..AsmOptions::default()
    };
    // LDW is not a mnemonic on the 6809: it becomes a label and the rest
    // of the line fails to parse
    let mut asm = Assembler::new(opts);
    assert!(asm.assemble("t", "  ORG 0\n  LDW #1\n").is_err());
}

#[test]
fn test_cpu_directive_switches_instruction_set() {
    let err = assemble_err("  CPU = 6809\n  ORG 0\n  ADDR A,B\n");
    assert!(err.contains("Syntax error"), "{}", err);
    let asm = assemble("  CPU = 6309\n  ORG 0\n  ADDR A,B\n");
    assert_eq!(bytes(&asm, 0, 3), vec![0x10, 0x30, 0x89]);
}

#[test]
fn test_expression_precedence_in_data() {
    let asm = assemble(indoc! {"
          ORG 0
          FCB 1 + 2 * 3
          FCB 1 | 2 & 3
          FCB 1 || 0 && 0
          FCB [8 + 2] * 2
    "});
    assert_eq!(bytes(&asm, 0, 4), vec![7, 3, 1, 20]);
}

#[test]
fn test_byte_word_long_data() {
    let asm = assemble(indoc! {"
          ORG $3000
        Msg FCB $20,\"Hi\\r\",0
          FDB $1234,Msg
          LONG 1000000
          FCC \"AB\"^
    "});
    assert_eq!(
        bytes(&asm, 0x3000, 15),
        vec![
            0x20, b'H', b'i', 13, 0, // FCB
            0x12, 0x34, 0x30, 0x00, // FDB
            0x00, 0x0F, 0x42, 0x40, // LONG 1000000
            b'A', b'B' | 0x80, // FCC with high bit marker
        ]
    );
    // ?Msg yields the byte length of the FCB line
    let idx = asm.symbols().find("Msg").unwrap();
    assert_eq!(asm.symbols().get(idx).bytes, 5);
}

#[test]
fn test_byte_length_token() {
    let asm = assemble(indoc! {"
          ORG $3000
        Msg FCB \"Hello\"
          LDB #?Msg
    "});
    assert_eq!(bytes(&asm, 0x3005, 2), vec![0xC6, 5]);
}

#[test]
fn test_bits_and_fill() {
    let asm = assemble(indoc! {"
          ORG 0
          BITS . . * . * . . .
          FILL 4 ($EA)
    "});
    assert_eq!(bytes(&asm, 0, 5), vec![0x28, 0xEA, 0xEA, 0xEA, 0xEA]);
}

#[test]
fn test_equ_set_enum_and_bss() {
    let asm = assemble(indoc! {"
        TXTPTR = $21b8
        OLDPTR EQU $21ba
        CURRENT SET 5
        CURRENT SET 6
        FIRST ENUM 10
        SECOND ENUM
        & = $033A
        TXTTAB BSS 2
        CURSOR BSS 1
          ORG 0
          FDB TXTPTR,OLDPTR,TXTTAB,CURSOR
          FCB CURRENT,FIRST,SECOND
    "});
    assert_eq!(
        bytes(&asm, 0, 11),
        vec![0x21, 0xb8, 0x21, 0xba, 0x03, 0x3A, 0x03, 0x3C, 6, 10, 11]
    );
}

#[test]
fn test_equ_conflict_is_fatal() {
    let err = assemble_err("X EQU 5\nX EQU 6\n");
    assert!(err.contains("Multiple assignments"), "{}", err);
}

#[test]
fn test_same_value_reassignment_tolerated() {
    let asm = assemble("X EQU 5\nX EQU 5\n  ORG 0\n  FCB X\n");
    assert_eq!(bytes(&asm, 0, 1), vec![5]);
}

#[test]
fn test_locked_symbol_rejects_redefinition() {
    let mut asm = Assembler::new(AsmOptions::default());
    asm.define_symbol("SPEED", 9);
    assert!(asm.assemble("t", "SPEED EQU 5\n").is_err());

    let mut asm = Assembler::new(AsmOptions::default());
    asm.define_symbol("SPEED", 9);
    asm.assemble("t", "SPEED EQU 9\n  ORG 0\n  FCB SPEED\n").unwrap();
    assert_eq!(asm.image().rom()[0], 9);
}

#[test]
fn test_overwrite_detection() {
    let err = assemble_err("  ORG $1000\n  FCB 1\n  ORG $1000\n  FCB 2\n");
    assert!(err.contains("overwrite"), "{}", err);

    // writing the same value twice is fine
    let asm = assemble("  ORG $1000\n  FCB 1\n  ORG $1000\n  FCB 1\n");
    assert_eq!(asm.image().rom()[0x1000], 1);
}

#[test]
fn test_module_scope_isolation() {
    let asm = assemble(indoc! {"
          ORG $1000
        MODULE Delay
        .loop LEAX -1,X
          BNE .loop
          RTS
        ENDMOD
        MODULE Strout
        .loop LDA ,X+
          BNE .loop
          RTS
        ENDMOD
    "});
    let delay = asm.symbols().find("Delay.loop").unwrap();
    let strout = asm.symbols().find("Strout.loop").unwrap();
    assert_eq!(asm.symbols().get(delay).value, Value::Known(0x1000));
    assert_eq!(asm.symbols().get(strout).value, Value::Known(0x1005));
    assert!(asm.symbols().find(".loop").is_none());
}

#[test]
fn test_conditional_nesting() {
    let asm = assemble(indoc! {"
          ORG 0
        if 1
          FCB 1
        if 0
          FCB 2
        endif
        else
          FCB 3
        endif
          FCB 4
    "});
    assert_eq!(bytes(&asm, 0, 2), vec![1, 4]);
    assert_eq!(asm.error_count(), 0);
}

#[test]
fn test_ifdef_with_command_line_symbol() {
    let mut asm = Assembler::new(AsmOptions::default());
    asm.define_symbol("MO5", 1);
    asm.assemble(
        "t",
        "  ORG 0\nifdef MO5\n  FCB 1\nelse\n  FCB 2\nendif\n",
    )
    .unwrap();
    assert_eq!(asm.image().rom()[0], 1);
}

#[test]
fn test_ifndef_skips_defined() {
    let mut asm = Assembler::new(AsmOptions::default());
    asm.define_symbol("TO9", 1);
    asm.assemble("t", "  ORG 0\nifndef TO9\n  FCB 1\nendif\n  FCB 9\n")
        .unwrap();
    assert_eq!(asm.image().rom()[0], 9);
}

#[test]
fn test_unmatched_endif_rejected() {
    let err = assemble_err("  ORG 0\nendif\n");
    assert!(err.contains("endif without if"), "{}", err);
}

#[test]
fn test_missing_endif_rejected() {
    let err = assemble_err("  ORG 0\nif 1\n  FCB 1\n");
    assert!(err.contains("endif"), "{}", err);
}

#[test]
fn test_error_directive_fires_in_active_branch() {
    let err = assemble_err("if 1\n#error this code is broken\nendif\n");
    assert!(err.contains("this code is broken"), "{}", err);

    let asm = assemble("if 0\n#error never seen\nendif\n");
    assert_eq!(asm.error_count(), 0);
}

#[test]
fn test_macro_call_style() {
    let asm = assemble(indoc! {"
        MACRO Foo(X)
          LDA #X
        ENDM
          ORG $2000
          Foo(5)
    "});
    assert_eq!(bytes(&asm, 0x2000, 2), vec![0x86, 5]);
}

#[test]
fn test_macro_expands_like_direct_source() {
    let direct = assemble("  ORG $2000\n  LDA #5\n");
    let through_macro = assemble(indoc! {"
        MACRO Foo(X)
          LDA #X
        ENDM
          ORG $2000
          Foo(5)
    "});
    assert_eq!(
        bytes(&direct, 0x2000, 2),
        bytes(&through_macro, 0x2000, 2)
    );
}

#[test]
fn test_macro_plain_style() {
    let asm = assemble(indoc! {"
        Pair MACRO Lo,Hi
          FCB Lo,Hi
        ENDM
          ORG 0
          Pair 1,2
          Pair 3,4
    "});
    assert_eq!(bytes(&asm, 0, 4), vec![1, 2, 3, 4]);
}

#[test]
fn test_macro_nesting() {
    let asm = assemble(indoc! {"
        MACRO Inner(A)
          FCB A
        ENDM
        MACRO Outer(B)
          Inner(B)
          Inner(B)
        ENDM
          ORG 0
          Outer(7)
    "});
    assert_eq!(bytes(&asm, 0, 2), vec![7, 7]);
}

#[test]
fn test_macro_argument_count_mismatch() {
    let err = assemble_err(indoc! {"
        MACRO Foo(A,B)
          FCB A,B
        ENDM
          ORG 0
          Foo(1)
    "});
    assert!(err.contains("Wrong # of arguments"), "{}", err);
}

#[test]
fn test_duplicate_macro_rejected() {
    let err = assemble_err(indoc! {"
        MACRO Foo(A)
          FCB A
        ENDM
        MACRO Foo(A)
          FCB A
        ENDM
    "});
    assert!(err.contains("Duplicate macro"), "{}", err);
}

#[test]
fn test_optimize_demotes_long_branch() {
    let opts = AsmOptions {
        optimize: true,
        ..AsmOptions::default()
    };
    let asm = assemble_with(
        indoc! {"
          ORG $1000
        Back NOP
          FILL 50 ($12)
          LBRA Back
          LBEQ Back
        "},
        opts,
    );
    // both long branches shrink to the short form
    // LBRA at $1033: disp = $1000 - ($1033 + 2) = -$35
    assert_eq!(bytes(&asm, 0x1033, 2), vec![0x20, 0xCB]);
    // LBEQ at $1035: disp = $1000 - ($1035 + 2) = -$37
    assert_eq!(bytes(&asm, 0x1035, 2), vec![0x27, 0xC9]);
    assert!(!asm.hints().is_empty());
}

#[test]
fn test_optimize_promotes_short_branch() {
    let opts = AsmOptions {
        optimize: true,
        ..AsmOptions::default()
    };
    let asm = assemble_with(
        indoc! {"
          ORG $1000
        Far NOP
          FILL 200 ($12)
          BEQ Far
        "},
        opts,
    );
    // BEQ at $10C9 cannot reach: promoted to LBEQ,
    // disp = $1000 - ($10C9 + 4) = -$CD
    assert_eq!(bytes(&asm, 0x10C9, 4), vec![0x10, 0x27, 0xFF, 0x33]);
}

#[test]
fn test_optimize_jmp_to_bra_with_nop_sync() {
    let opts = AsmOptions {
        optimize: true,
        ..AsmOptions::default()
    };
    let asm = assemble_with(
        indoc! {"
          ORG $1000
        Loop NOP
          JMP Loop
          RTS
        "},
        opts,
    );
    // JMP substitutes to BRA in phase 1 (2 bytes), RTS follows directly
    assert_eq!(bytes(&asm, 0x1000, 4), vec![0x12, 0x20, 0xFD, 0x39]);
}

#[test]
fn test_phase_agreement_nop_padding_for_indexed_forward_offset() {
    let asm = assemble(indoc! {"
          ORG $1000
          LDA OFF,X
          RTS
        OFF EQU 5
    "});
    // phase 1 reserved a 16 bit offset for the unresolved symbol; phase 2
    // settles on the 5 bit form and pads with NOPs to keep addresses
    assert_eq!(bytes(&asm, 0x1000, 5), vec![0xA6, 0x05, 0x12, 0x12, 0x39]);
}

#[test]
fn test_undefined_symbol_sweep_is_nonfatal() {
    let mut asm = Assembler::new(AsmOptions::default());
    asm.assemble("t", "  ORG 0\n  FDB Missing\n").unwrap();
    assert_eq!(asm.error_count(), 1);
    assert_eq!(&asm.image().rom()[0..2], &[0, 0]);
}

#[test]
fn test_undefined_immediate_is_fatal() {
    let err = assemble_err("  ORG 0\n  LDA #Missing\n");
    assert!(err.contains("Undefined"), "{}", err);
}

#[test]
fn test_rmb_and_align() {
    let asm = assemble(indoc! {"
          ORG $1001
          RMB 3
          FCB 1
          ALIGN 16
          FCB 2
    "});
    assert_eq!(asm.image().rom()[0x1004], 1);
    assert_eq!(asm.image().rom()[0x1010], 2);
    assert!(!asm.image().is_locked(0x1001));
}

#[test]
fn test_end_stops_assembly() {
    let asm = assemble("  ORG 0\n  FCB 1\n  END\n  FCB 2\n");
    assert_eq!(asm.image().rom()[0], 1);
    assert!(!asm.image().is_locked(1));
}

#[test]
fn test_case_directive() {
    let asm = assemble("CASE -\nValue EQU 7\n  ORG 0\n  FCB VALUE\n");
    assert_eq!(asm.image().rom()[0], 7);

    let mut asm = Assembler::new(AsmOptions::default());
    // case sensitive by default: VALUE is a different, undefined symbol
    asm.assemble("t", "Value EQU 7\n  ORG 0\n  FCB Value\n  FDB VALUE\n")
        .unwrap();
    assert_eq!(asm.error_count(), 1);
}

#[test]
fn test_star_assign_and_bss_pointer() {
    let asm = assemble(indoc! {"
          * = $E000
          NOP
          & = $100
        V1 BSS 2
          ORG 0
          FDB V1
    "});
    assert_eq!(asm.image().rom()[0xE000], 0x12);
    assert_eq!(&asm.image().rom()[0..2], &[0x01, 0x00]);
}

#[test]
fn test_store_registers_segments_once() {
    let asm = assemble(indoc! {"
          ORG $E000
          LDA #1
          STORE $E000,2,\"rom.bin\"
          STORE $E000,2,\"rom.s19\",s19,$E000
    "});
    let segments = asm.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].start, 0xE000);
    assert_eq!(segments[0].length, 2);
    assert_eq!(segments[0].file_name, "rom.bin");
    assert_eq!(segments[0].entry, None);
    assert_eq!(segments[1].entry, Some(0xE000));
}

#[test]
fn test_include_file() {
    let dir = std::env::temp_dir().join(format!("asm9-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let inc = dir.join("defs.as9");
    std::fs::write(&inc, "CR EQU 13\n").unwrap();

    let source = format!("  INCLUDE \"{}\"\n  ORG 0\n  FCB CR\n", inc.display());
    let asm = assemble(&source);
    assert_eq!(asm.image().rom()[0], 13);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_include_depth_limit_is_fatal() {
    let dir = std::env::temp_dir().join(format!("asm9-inc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("self.as9");
    std::fs::write(&path, format!("  INCLUDE \"{}\"\n", path.display())).unwrap();
    let source = format!("  INCLUDE \"{}\"\n", path.display());

    let mut asm = Assembler::new(AsmOptions::default());
    let err = asm.assemble("t", &source).unwrap_err();
    assert!(format!("{}", err).contains("includes nested"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_reserved_mnemonic_as_operand_rejected() {
    let err = assemble_err("  ORG 0\n  FDB LDA\n");
    assert!(err.contains("reserved"), "{}", err);
}

#[test]
fn test_listing_collects_phase2_lines() {
    let asm = assemble("  ORG $E000\n  LDA #10\n; comment\n");
    let listing = asm.listing();
    assert_eq!(listing.len(), 3);
    assert_eq!(listing[1].addr, Some(0xE000));
    assert_eq!(listing[1].bytes, vec![0x86, 0x0A]);
    assert!(listing[2].text.contains("comment"));
}

#[test]
fn test_symbol_references_recorded_once() {
    let asm = assemble(indoc! {"
          ORG $1000
        Start NOP
          BRA Start
          JMP Start
    "});
    let idx = asm.symbols().find("Start").unwrap();
    let sym = asm.symbols().get(idx);
    // one defining reference plus one per use, recorded in phase 2 only
    assert_eq!(sym.refs.len(), 3);
}

#[test]
fn test_program_counter_required_for_code() {
    let err = assemble_err("  LDA #1\n");
    assert!(err.contains("program counter"), "{}", err);
}

#[test]
fn test_pc_overflow_detected() {
    let err = assemble_err("  ORG $FFFF\n  FDB 1,2,3\n");
    assert!(err.contains("overflow"), "{}", err);
}
