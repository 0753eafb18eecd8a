// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! GNU assembler listing parser.
//!
//! A listing line that produced code starts with the source line number, a
//! hex address and the emitted bytes:
//!
//! ```text
//!    2 0000 62D1F548       VPADDQ  ZMM0,ZMM1,ZMM8
//!    2      D4C0
//! ```
//!
//! Bytes that do not fit the first row continue on rows holding only the
//! line number and more hex, indented past the address column.

use std::collections::BTreeMap;

/// Encoded bytes per source line of the assembled file.
pub type ListingBytes = BTreeMap<usize, Vec<u8>>;

#[derive(Debug, PartialEq, Eq)]
enum ListingRow {
    Header { line: usize, bytes: Vec<u8> },
    Sequel { line: usize, bytes: Vec<u8> },
}

pub fn parse_listing(text: &str) -> Result<ListingBytes, String> {
    let mut by_line = ListingBytes::new();
    let mut current: Option<usize> = None;

    for raw in text.lines() {
        match parse_row(raw) {
            Some(ListingRow::Header { line, bytes }) => {
                current = Some(line);
                by_line.entry(line).or_default().extend(bytes);
            }
            Some(ListingRow::Sequel { line, bytes }) => {
                if current != Some(line) {
                    return Err(format!(
                        "continuation bytes for line {line} do not follow that line's first row"
                    ));
                }
                by_line.entry(line).or_default().extend(bytes);
            }
            None => {}
        }
    }

    Ok(by_line)
}

/// Splits listing bytes back into one encoding per submitted instruction,
/// where instruction `k` sits on source line `first_line + k`.
pub fn demultiplex(
    by_line: &ListingBytes,
    first_line: usize,
    count: usize,
) -> Result<Vec<Vec<u8>>, String> {
    let expected = first_line..first_line + count;
    if let Some(stray) = by_line.keys().find(|line| !expected.contains(line)) {
        return Err(format!(
            "listing reports bytes for source line {stray}, which holds no submitted instruction"
        ));
    }

    let mut encodings = Vec::with_capacity(count);
    for (offset, line) in expected.enumerate() {
        match by_line.get(&line) {
            Some(bytes) if !bytes.is_empty() => encodings.push(bytes.clone()),
            _ => {
                return Err(format!(
                    "listing has no bytes for instruction {} of {count} (source line {line})",
                    offset + 1
                ))
            }
        }
    }
    Ok(encodings)
}

fn parse_row(raw: &str) -> Option<ListingRow> {
    if raw.contains("GAS LISTING") {
        return None;
    }
    let trimmed = raw.trim_start();
    let digits = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits == 0 {
        return None;
    }
    let line = trimmed[..digits].parse().ok()?;
    let rest = &trimmed[digits..];
    let gap = rest.len() - rest.trim_start_matches(' ').len();

    let mut fields = rest.split_whitespace();
    if gap == 1 {
        let address = fields.next()?;
        if !address.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return None;
        }
        let bytes = decode_hex(fields.next()?)?;
        Some(ListingRow::Header { line, bytes })
    } else if gap > 1 {
        let bytes = decode_hex(fields.next()?)?;
        if fields.next().is_some() {
            return None;
        }
        Some(ListingRow::Sequel { line, bytes })
    } else {
        None
    }
}

fn decode_hex(field: &str) -> Option<Vec<u8>> {
    if field.is_empty() || field.len() % 2 != 0 {
        return None;
    }
    (0..field.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(field.get(at..at + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = "1                    .intel_syntax noprefix\n\
                          \x20  2 0000 62D1F548       VPADDQ  ZMM0,ZMM1,ZMM8\n\
                          \x20  2      D4C0\n\
                          \x20  3              ";

    const MULTIPLE: &str = "   1                    .intel_syntax noprefix\n\
                            \x20  2 0000 C4C171D4       VPADDQ  XMM0,XMM1,XMM8\n\
                            \x20  2      C0\n\
                            \x20  3 0005 C4C169D4       VPADDQ  XMM1,XMM2,XMM9\n\
                            \x20  3      C9\n\
                            \x20  4 000a C4C161D4       VPADDQ  XMM2,XMM3,XMM10\n\
                            \x20  4      D2\n\
                            \x20  5          ";

    #[test]
    fn joins_header_and_continuation_rows() {
        let by_line = parse_listing(SINGLE).expect("listing");
        let encodings = demultiplex(&by_line, 2, 1).expect("demux");
        assert_eq!(encodings, vec![vec![98, 209, 245, 72, 212, 192]]);
    }

    #[test]
    fn splits_batch_by_source_line() {
        let by_line = parse_listing(MULTIPLE).expect("listing");
        let encodings = demultiplex(&by_line, 2, 3).expect("demux");
        assert_eq!(
            encodings,
            vec![
                vec![196, 193, 113, 212, 192],
                vec![196, 193, 105, 212, 201],
                vec![196, 193, 97, 212, 210],
            ]
        );
    }

    #[test]
    fn skips_page_headers_and_source_only_rows() {
        let text = "GAS LISTING /tmp/x.s \t\t\tpage 1\n\n\n   1              .code64\n   2 0000 90       \tnop\n";
        let by_line = parse_listing(text).expect("listing");
        assert_eq!(by_line.len(), 1);
        assert_eq!(by_line[&2], vec![0x90]);
    }

    #[test]
    fn missing_instruction_bytes_fail_correlation() {
        let by_line = parse_listing(SINGLE).expect("listing");
        let err = demultiplex(&by_line, 2, 2).expect_err("short listing");
        assert!(err.contains("instruction 2 of 2"), "{err}");
    }

    #[test]
    fn stray_lines_fail_correlation() {
        let by_line = parse_listing(MULTIPLE).expect("listing");
        let err = demultiplex(&by_line, 2, 2).expect_err("extra line");
        assert!(err.contains("source line 4"), "{err}");
    }

    #[test]
    fn orphan_continuation_is_rejected() {
        let text = "   2 0000 62D1F548 \t\tVPADDQ  ZMM0,ZMM1,ZMM8\n   3      D4C0\n";
        assert!(parse_listing(text).is_err());
    }
}
