// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Packing of a run of consecutive instructions into one token stream.
//!
//! The encodings are concatenated and re-sliced, so tokens may straddle
//! instruction boundaries. A row carries the comments of every instruction
//! that starts inside it, in source order and separated by one space. A row
//! in which no instruction starts is emitted as a plain continuation.

use super::classifier::Instruction;
use super::config::RewriterConfig;
use super::layout::{format_instruction, pad_literal, split_rows};
use super::literal::{literal_text, slice_encoding, tokens_to_bytes};

#[derive(Debug, Clone, Copy)]
pub struct PackMember<'a> {
    pub instruction: &'a Instruction,
    pub encoding: &'a [u8],
}

/// Lines for a packable group, never more than the unpacked layout needs.
pub fn pack_group(members: &[PackMember<'_>], config: &RewriterConfig) -> Vec<String> {
    let packed = packed_lines(members, config);
    let unpacked = unpacked_lines(members, config);
    if packed.len() <= unpacked.len() {
        packed
    } else {
        unpacked
    }
}

pub fn unpacked_lines(members: &[PackMember<'_>], config: &RewriterConfig) -> Vec<String> {
    let token_set = config.token_set();
    members
        .iter()
        .flat_map(|member| {
            let tokens = slice_encoding(member.encoding, token_set);
            format_instruction(&tokens, member.instruction, config.line_budget).into_lines()
        })
        .collect()
}

pub fn packed_lines(members: &[PackMember<'_>], config: &RewriterConfig) -> Vec<String> {
    let mut stream = Vec::new();
    let mut starts = Vec::with_capacity(members.len());
    for member in members {
        starts.push(stream.len());
        stream.extend_from_slice(member.encoding);
    }

    let tokens = slice_encoding(&stream, config.token_set());
    let rows = split_rows(&tokens, config.line_budget);
    let mut lines = Vec::with_capacity(rows.len());
    let mut next_member = 0usize;
    let mut row_start = 0usize;

    for row in rows {
        let row_end = row_start + tokens_to_bytes(&row).len();
        let first = next_member;
        while next_member < members.len() && starts[next_member] < row_end {
            next_member += 1;
        }

        let literal = literal_text(&row);
        let starting = &members[first..next_member];
        if starting.is_empty() {
            lines.push(literal);
        } else {
            let (padded, _) = pad_literal(&literal, config.comment_column, false);
            let comments: Vec<String> = starting
                .iter()
                .map(|member| member.instruction.comment())
                .collect();
            lines.push(format!("{padded}{}", comments.join(" ")));
        }
        row_start = row_end;
    }

    lines
}
