//! Segment output writers: raw binary and Motorola S-records.
//!
//! Both consume only the finished memory image and the segment
//! descriptors registered by STORE directives.

use asm9_core::{MemoryImage, Segment, SegmentFormat};
use std::fs;
use std::io;

/// Header text carried in the S0 record.
const S0_HEADER: &str = "asm9 cross assembler";

/// Bytes of one stored segment in raw format. When an entry address is
/// present the image is headed by the two-byte big-endian load address.
pub fn raw_segment(image: &MemoryImage, seg: &Segment) -> Vec<u8> {
    let start = seg.start as usize;
    let end = start + seg.length as usize;
    let mut out = Vec::with_capacity(seg.length as usize + 2);
    if seg.entry.is_some() {
        out.push((seg.start >> 8) as u8);
        out.push(seg.start as u8);
    }
    out.extend_from_slice(&image.rom()[start..end]);
    out
}

fn srecord_line(out: &mut String, record_type: &str, addr: u16, data: &[u8]) {
    out.push_str(record_type);
    let count = data.len() + 3; // two address bytes plus checksum
    let mut checksum = count + (addr & 0xff) as usize + (addr >> 8) as usize;
    out.push_str(&format!("{:02X}{:04X}", count, addr));
    for &b in data {
        out.push_str(&format!("{:02X}", b));
        checksum += b as usize;
    }
    // CR LF line endings for ancient EPROM programmers
    out.push_str(&format!("{:02X}\r\n", !checksum & 0xff));
}

/// S-record text of one stored segment: S0 header, S1 data records of up
/// to 32 bytes, an S5 record count and, when an entry address is present,
/// a terminating S9.
pub fn srecord_segment(image: &MemoryImage, seg: &Segment) -> String {
    let mut out = String::new();
    srecord_line(&mut out, "S0", 0, S0_HEADER.as_bytes());

    let mut addr = seg.start as usize;
    let mut remaining = seg.length as usize;
    let mut records: u16 = 0;
    while remaining > 0 {
        let n = remaining.min(32);
        srecord_line(&mut out, "S1", addr as u16, &image.rom()[addr..addr + n]);
        records += 1;
        addr += n;
        remaining -= n;
    }

    srecord_line(&mut out, "S5", records, &[]);
    if let Some(entry) = seg.entry {
        srecord_line(&mut out, "S9", entry, &[]);
    }
    out
}

/// Write every registered segment to its destination file. S-record
/// destinations get a .s19 extension when the name carries none.
pub fn write_segments(image: &MemoryImage, segments: &[Segment]) -> io::Result<()> {
    for seg in segments {
        match seg.format {
            SegmentFormat::Raw => {
                fs::write(&seg.file_name, raw_segment(image, seg))?;
            }
            SegmentFormat::SRecord => {
                let name = if seg.file_name.contains('.') {
                    seg.file_name.clone()
                } else {
                    format!("{}.s19", seg.file_name)
                };
                fs::write(name, srecord_segment(image, seg))?;
            }
        }
        log::info!(
            "stored {:04x} - {:04x} <{}>",
            seg.start,
            seg.start as u32 + seg.length - 1,
            seg.file_name
        );
    }
    Ok(())
}

/// Decode S-record text back into (address, data) runs plus the optional
/// S9 entry address. Records with a bad checksum are rejected.
pub fn decode_srecords(text: &str) -> Result<(Vec<(u16, Vec<u8>)>, Option<u16>), String> {
    let mut runs = Vec::new();
    let mut entry = None;
    for line in text.lines() {
        let line = line.trim();
        if line.len() < 4 || !line.starts_with('S') {
            continue;
        }
        let kind = &line[..2];
        let count = u8::from_str_radix(&line[2..4], 16).map_err(|e| e.to_string())? as usize;
        if line.len() < 4 + count * 2 {
            return Err(format!("truncated record: {}", line));
        }
        let mut bytes = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + i * 2;
            bytes.push(
                u8::from_str_radix(&line[off..off + 2], 16).map_err(|e| e.to_string())?,
            );
        }
        let sum: u32 = count as u32 + bytes.iter().map(|&b| b as u32).sum::<u32>();
        if sum & 0xff != 0xff {
            return Err(format!("checksum mismatch: {}", line));
        }
        let addr = ((bytes[0] as u16) << 8) | bytes[1] as u16;
        let data = bytes[2..count - 1].to_vec();
        match kind {
            "S1" => runs.push((addr, data)),
            "S9" => entry = Some(addr),
            _ => {}
        }
    }
    Ok((runs, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use asm9_core::{AsmOptions, Assembler};
    use pretty_assertions::assert_eq;

    fn assembled(source: &str) -> Assembler {
        let mut asm = Assembler::new(AsmOptions::default());
        asm.assemble("test.as9", source).unwrap();
        asm
    }

    #[test]
    fn test_raw_segment_with_header() {
        let asm = assembled("  ORG $2000\n  FCB 1,2,3\n  STORE $2000,3,\"x.bin\",bin,$2000\n");
        let seg = &asm.segments()[0];
        let raw = raw_segment(asm.image(), seg);
        assert_eq!(raw, vec![0x20, 0x00, 1, 2, 3]);
    }

    #[test]
    fn test_srecord_round_trip() {
        let asm = assembled(
            "  ORG $E000\n  LDA #$41\n  FCB 1,2,3,4,5,6,7,8\n  STORE $E000,10,\"x\",s19,$E000\n",
        );
        let seg = &asm.segments()[0];
        let text = srecord_segment(asm.image(), seg);
        let (runs, entry) = decode_srecords(&text).unwrap();
        assert_eq!(entry, Some(0xE000));
        let mut bytes = Vec::new();
        let mut addr = None;
        for (a, data) in runs {
            if addr.is_none() {
                addr = Some(a);
            }
            bytes.extend(data);
        }
        assert_eq!(addr, Some(0xE000));
        assert_eq!(bytes, asm.image().rom()[0xE000..0xE00A].to_vec());
        assert_eq!(&bytes[..2], &[0x86, 0x41]);
    }

    #[test]
    fn test_srecord_record_sizes() {
        let asm = assembled("  ORG $1000\n  FILL 100 ($EA)\n  STORE $1000,100,\"x\",s19\n");
        let text = srecord_segment(asm.image(), &asm.segments()[0]);
        let s1_count = text.lines().filter(|l| l.starts_with("S1")).count();
        // 100 bytes in records of 32
        assert_eq!(s1_count, 4);
        let (runs, entry) = decode_srecords(&text).unwrap();
        assert_eq!(entry, None);
        assert_eq!(runs.iter().map(|(_, d)| d.len()).sum::<usize>(), 100);
        assert!(runs.iter().flat_map(|(_, d)| d).all(|&b| b == 0xEA));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let asm = assembled("  ORG 0\n  FCB 1\n  STORE 0,1,\"x\",s19\n");
        let text = srecord_segment(asm.image(), &asm.segments()[0]);
        let s1 = text.lines().find(|l| l.starts_with("S1")).unwrap();
        let bad = if s1.ends_with("00") {
            format!("{}FF", &s1[..s1.len() - 2])
        } else {
            format!("{}00", &s1[..s1.len() - 2])
        };
        let corrupted = text.replace(s1, &bad);
        assert!(decode_srecords(&corrupted).is_err());
    }
}
