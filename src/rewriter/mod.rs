// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Placeholder-to-literal rewriting of Plan 9 assembly sources.

mod classifier;
mod config;
mod continuation;
mod diagnostics;
mod engine;
mod error;
mod layout;
mod literal;
mod packer;
mod planner;
mod renderer;
mod surface_tokenizer;

pub use classifier::{
    classify_document, ClassifiedDocument, ClassifiedLine, Instruction, InstructionKey,
    LineClass, MAX_INSTRUCTION_BYTES,
};
pub use config::{BackendKind, BitMode, ConfigError, RewriterConfig, MIN_LINE_BUDGET};
pub use continuation::{match_continuation, scan_continuations, ContinuationMatch};
pub use diagnostics::{collect_ambiguity_diagnostics, DiagnosticKind, RewriteDiagnostic};
pub use engine::{
    RewriteEngine, RewriteFileReport, RewriteMode, RewriteOutput, RewriteRunReport,
    RewriteRunSummary,
};
pub use error::RewriteError;
pub use layout::{
    format_instruction, format_macro_terminal, pad_continuation, pad_literal, row_budget,
    split_define_marker, split_rows, RewrittenLines, DEFINE_MARKER,
};
pub use literal::{
    join_tokens, literal_len, literal_text, match_literal, natural_literal_len, slice_encoding,
    slice_tokens, tokens_to_bytes, LiteralMatch, Token, TokenSet, TokenWidth, LITERAL_INDENT,
    TOKEN_SEPARATOR,
};
pub use packer::{pack_group, packed_lines, unpacked_lines, PackMember};
pub use planner::{plan_document, EncodingTable, PlannedLine, RewritePlan};
pub use surface_tokenizer::{
    restore_leading_tab, tokenize_source, LineEnding, SurfaceDocument, SurfaceLine,
    COMMENT_DELIMITER, TAB_WIDTH,
};
