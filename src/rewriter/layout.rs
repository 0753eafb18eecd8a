// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Column layout of literal lines: comment padding, macro markers and
//! splitting of literals that exceed the per-line budget.

use super::classifier::Instruction;
use super::literal::{literal_len, literal_text, Token};

/// Line-continuation marker of a macro body.
pub const DEFINE_MARKER: char = '\\';
/// Columns reserved before the comment for the marker and its trailing space.
pub const DEFINE_RESERVE: usize = 2;

/// Splits a trailing macro marker off a literal prefix, returning the
/// trimmed literal part and whether the marker was present.
pub fn split_define_marker(prefix: &str) -> (&str, bool) {
    let trimmed = prefix.trim_end();
    match trimmed.strip_suffix(DEFINE_MARKER) {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    }
}

/// Pads literal text so a comment appended afterwards starts at
/// `comment_column`. Returns the padded text and whether the literal was too
/// wide, in which case exactly one space separates literal and comment.
pub fn pad_literal(text: &str, comment_column: usize, in_define: bool) -> (String, bool) {
    let target = if in_define {
        comment_column.saturating_sub(DEFINE_RESERVE)
    } else {
        comment_column
    };
    let overflowed = text.len() >= target;
    let mut out = String::with_capacity(target.max(text.len() + 1) + DEFINE_RESERVE);
    out.push_str(text);
    if overflowed {
        out.push(' ');
    } else {
        out.push_str(&" ".repeat(target - text.len()));
    }
    if in_define {
        out.push(DEFINE_MARKER);
        out.push(' ');
    }
    (out, overflowed)
}

/// Continuation line text: the literal alone, or with the macro marker in
/// the reserved column.
pub fn pad_continuation(text: &str, comment_column: usize, in_define: bool) -> String {
    if !in_define {
        return text.to_string();
    }
    let target = comment_column.saturating_sub(DEFINE_RESERVE);
    let mut out = String::with_capacity(target.max(text.len() + 1) + 1);
    out.push_str(text);
    if text.len() >= target {
        out.push(' ');
    } else {
        out.push_str(&" ".repeat(target - text.len()));
    }
    out.push(DEFINE_MARKER);
    out
}

/// Per-line literal budget. Inside a macro body every line must leave room
/// for the marker column.
pub fn row_budget(line_budget: usize, comment_column: usize, in_define: bool) -> usize {
    if in_define {
        line_budget.min(comment_column.saturating_sub(DEFINE_RESERVE + 1))
    } else {
        line_budget
    }
}

/// Distributes tokens over rows whose literal text fits `budget` columns.
/// Every row holds at least one token.
pub fn split_rows(tokens: &[Token], budget: usize) -> Vec<Vec<Token>> {
    let mut rows: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    for token in tokens {
        current.push(*token);
        if current.len() > 1 && literal_len(&current) > budget {
            current.pop();
            rows.push(std::mem::take(&mut current));
            current.push(*token);
        }
    }
    if !current.is_empty() || rows.is_empty() {
        rows.push(current);
    }
    rows
}

/// One rewritten instruction: the primary line plus overflow continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenLines {
    pub primary: String,
    pub continuations: Vec<String>,
}

impl RewrittenLines {
    pub fn line_count(&self) -> usize {
        1 + self.continuations.len()
    }

    pub fn into_lines(self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.line_count());
        lines.push(self.primary);
        lines.extend(self.continuations);
        lines
    }
}

pub fn format_instruction(
    tokens: &[Token],
    instruction: &Instruction,
    line_budget: usize,
) -> RewrittenLines {
    format_rows(tokens, instruction, line_budget, instruction.in_define)
}

/// Layout of the plain line that closes a macro body. A literal spilling onto
/// continuation lines keeps the marker on the primary line and on every
/// continuation but the last, so the spilled rows stay inside the macro.
pub fn format_macro_terminal(
    tokens: &[Token],
    instruction: &Instruction,
    line_budget: usize,
) -> RewrittenLines {
    let plain = format_rows(tokens, instruction, line_budget, false);
    if plain.continuations.is_empty() {
        return plain;
    }
    let mut lines = format_rows(tokens, instruction, line_budget, true);
    if let Some(last) = lines.continuations.last_mut() {
        let (body, _) = split_define_marker(last);
        *last = body.to_string();
    }
    lines
}

fn format_rows(
    tokens: &[Token],
    instruction: &Instruction,
    line_budget: usize,
    in_define: bool,
) -> RewrittenLines {
    let column = instruction.comment_column;
    let budget = row_budget(line_budget, column, in_define);

    let mut rows = split_rows(tokens, budget).into_iter();
    let first = rows.next().unwrap_or_default();
    let (padded, _) = pad_literal(&literal_text(&first), column, in_define);
    let primary = format!("{padded}{}", instruction.comment());
    let continuations = rows
        .map(|row| pad_continuation(&literal_text(&row), column, in_define))
        .collect();

    RewrittenLines {
        primary,
        continuations,
    }
}
