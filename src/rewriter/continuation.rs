// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pre-pass that recognizes comment-less literal lines a previous run
//! generated below an instruction whose encoding did not fit on one line.

use super::layout::split_define_marker;
use super::literal::{match_literal, LiteralMatch, Token};
use super::surface_tokenizer::{SurfaceDocument, SurfaceLine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationMatch {
    Full { tokens: Vec<Token>, in_define: bool },
    /// Looks like a continuation but does not match the token grammar.
    Partial,
    NoMatch,
}

pub fn match_continuation(line: &SurfaceLine) -> ContinuationMatch {
    if line.has_comment() {
        return ContinuationMatch::NoMatch;
    }
    let (body, in_define) = split_define_marker(&line.expanded);
    match match_literal(body) {
        LiteralMatch::Tokens(tokens) => ContinuationMatch::Full { tokens, in_define },
        LiteralMatch::Partial => ContinuationMatch::Partial,
        LiteralMatch::NotLiteral => ContinuationMatch::NoMatch,
    }
}

/// Candidate continuation shape of every line. Whether a candidate is owned
/// by a preceding instruction is decided during classification.
pub fn scan_continuations(doc: &SurfaceDocument) -> Vec<ContinuationMatch> {
    doc.lines.iter().map(match_continuation).collect()
}
