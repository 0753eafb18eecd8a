// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Line classification: which lines request an encoding, which carry a
//! literal from a previous run, and which are left alone.

use super::config::RewriterConfig;
use super::continuation::{scan_continuations, ContinuationMatch};
use super::layout::split_define_marker;
use super::literal::{match_literal, natural_literal_len, LiteralMatch, Token};
use super::surface_tokenizer::{SurfaceDocument, SurfaceLine, COMMENT_DELIMITER};
use crate::oracle::strip_inline_comment;

/// Longest x86 encoding; bounds the placeholder widths that are recognized.
pub const MAX_INSTRUCTION_BYTES: usize = 15;

/// An instruction found in a comment and the position its literal goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Text after the comment delimiter, unmodified.
    pub text: String,
    /// 1-based source line.
    pub line_number: usize,
    /// Column where the comment delimiter starts, after tab expansion.
    pub comment_column: usize,
    pub in_define: bool,
    pub starts_with_tab: bool,
}

impl Instruction {
    pub fn comment(&self) -> String {
        format!("{COMMENT_DELIMITER}{}", self.text)
    }

    /// Text handed to an encoder backend.
    pub fn oracle_text(&self) -> &str {
        strip_inline_comment(&self.text)
    }
}

/// Identifies one instruction: its zero-based source line and its position
/// among the instructions sharing that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionKey {
    pub line: usize,
    pub slot: usize,
}

impl InstructionKey {
    pub const fn new(line: usize, slot: usize) -> Self {
        Self { line, slot }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Passthrough,
    EncodeRequest(Instruction),
    /// A literal line. Packed rows list every instruction starting in them.
    AlreadyEncoded {
        instructions: Vec<Instruction>,
        tokens: Vec<Token>,
    },
    ContinuationOfPrevious {
        tokens: Vec<Token>,
        in_define: bool,
    },
}

impl LineClass {
    pub fn instructions(&self) -> &[Instruction] {
        match self {
            Self::EncodeRequest(instruction) => std::slice::from_ref(instruction),
            Self::AlreadyEncoded { instructions, .. } => instructions,
            Self::Passthrough | Self::ContinuationOfPrevious { .. } => &[],
        }
    }

    fn instructions_mut(&mut self) -> &mut [Instruction] {
        match self {
            Self::EncodeRequest(instruction) => std::slice::from_mut(instruction),
            Self::AlreadyEncoded { instructions, .. } => instructions,
            Self::Passthrough | Self::ContinuationOfPrevious { .. } => &mut [],
        }
    }

    fn owns_continuations(&self) -> bool {
        !matches!(self, Self::Passthrough)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub class: LineClass,
    /// Set when the line resembles a literal line but was left untouched.
    pub suspicious: Option<String>,
}

impl ClassifiedLine {
    fn plain(class: LineClass) -> Self {
        Self {
            class,
            suspicious: None,
        }
    }

    fn suspicious(message: impl Into<String>) -> Self {
        Self {
            class: LineClass::Passthrough,
            suspicious: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifiedDocument {
    pub lines: Vec<ClassifiedLine>,
}

impl ClassifiedDocument {
    /// Instructions in source order with their keys.
    pub fn instructions(&self) -> impl Iterator<Item = (InstructionKey, &Instruction)> {
        self.lines.iter().enumerate().flat_map(|(index, line)| {
            line.class
                .instructions()
                .iter()
                .enumerate()
                .map(move |(slot, instruction)| (InstructionKey::new(index, slot), instruction))
        })
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions().count()
    }
}

pub fn classify_document(doc: &SurfaceDocument, config: &RewriterConfig) -> ClassifiedDocument {
    let continuations = scan_continuations(doc);
    let mut lines = Vec::with_capacity(doc.lines.len());
    let mut owner_open = false;

    for (index, (line, continuation)) in doc.lines.iter().zip(continuations).enumerate() {
        let classified = match line.comment_fields() {
            Some((prefix, text)) => {
                classify_comment_line(prefix, text, index + 1, line.starts_with_tab, config)
            }
            None if line.has_comment() => classify_multi_comment_line(line, index + 1, config),
            None => match continuation {
                ContinuationMatch::Full { tokens, in_define } if owner_open => {
                    ClassifiedLine::plain(LineClass::ContinuationOfPrevious { tokens, in_define })
                }
                ContinuationMatch::Partial if owner_open => ClassifiedLine::suspicious(
                    "line after an encoded instruction resembles a literal continuation but does not match the token grammar",
                ),
                _ => ClassifiedLine::plain(LineClass::Passthrough),
            },
        };
        owner_open = classified.class.owns_continuations();
        lines.push(classified);
    }

    settle_macro_terminals(&mut lines);
    ClassifiedDocument { lines }
}

/// The line closing a macro body keeps the marker on every physical line but
/// its last. Such an owner is a plain instruction, not part of the body.
fn settle_macro_terminals(lines: &mut [ClassifiedLine]) {
    let mut index = 0;
    while index < lines.len() {
        let run = lines[index + 1..]
            .iter()
            .take_while(|line| matches!(line.class, LineClass::ContinuationOfPrevious { .. }))
            .count();
        let closes_macro = matches!(
            lines[index + run].class,
            LineClass::ContinuationOfPrevious {
                in_define: false,
                ..
            }
        );
        if run > 0 && closes_macro {
            for instruction in lines[index].class.instructions_mut() {
                instruction.in_define = false;
            }
        }
        index += run + 1;
    }
}

fn classify_comment_line(
    prefix: &str,
    text: &str,
    line_number: usize,
    starts_with_tab: bool,
    config: &RewriterConfig,
) -> ClassifiedLine {
    let (body, in_define) = split_define_marker(prefix);
    let blank = body.trim().is_empty();
    if blank && !is_placeholder_width(prefix.len(), in_define, config) {
        return ClassifiedLine::plain(LineClass::Passthrough);
    }

    let tokens = if blank {
        None
    } else {
        match match_literal(body) {
            LiteralMatch::Tokens(tokens) => Some(tokens),
            LiteralMatch::Partial => {
                return ClassifiedLine::suspicious(
                    "literal column resembles encoded output but does not match the token grammar",
                )
            }
            LiteralMatch::NotLiteral => return ClassifiedLine::plain(LineClass::Passthrough),
        }
    };

    if strip_inline_comment(text).is_empty() {
        return ClassifiedLine::plain(LineClass::Passthrough);
    }

    let instruction = Instruction {
        text: text.to_string(),
        line_number,
        comment_column: prefix.len(),
        in_define,
        starts_with_tab,
    };
    ClassifiedLine::plain(match tokens {
        Some(tokens) => LineClass::AlreadyEncoded {
            instructions: vec![instruction],
            tokens,
        },
        None => LineClass::EncodeRequest(instruction),
    })
}

/// A literal line with several comments is a packed row: the comments are
/// the instructions starting in it, separated by one space.
fn classify_multi_comment_line(
    line: &SurfaceLine,
    line_number: usize,
    config: &RewriterConfig,
) -> ClassifiedLine {
    let mut fields = line.expanded.split(COMMENT_DELIMITER);
    let prefix = fields.next().unwrap_or_default();
    let (body, in_define) = split_define_marker(prefix);
    let tokens = match match_literal(body) {
        LiteralMatch::NotLiteral => return ClassifiedLine::plain(LineClass::Passthrough),
        LiteralMatch::Partial => {
            return ClassifiedLine::suspicious(
                "literal column resembles encoded output but does not match the token grammar",
            )
        }
        LiteralMatch::Tokens(tokens) => tokens,
    };
    if in_define || !is_packed_row_prefix(prefix, body, config) {
        return ClassifiedLine::suspicious("literal line holds more than one comment delimiter");
    }

    let texts: Vec<&str> = fields.collect();
    let last = texts.len().saturating_sub(1);
    let mut instructions = Vec::with_capacity(texts.len());
    for (slot, text) in texts.into_iter().enumerate() {
        let text = match text.strip_suffix(' ') {
            Some(trimmed) if slot < last => trimmed,
            _ => text,
        };
        if strip_inline_comment(text).is_empty() {
            return ClassifiedLine::suspicious("packed literal line has an empty instruction comment");
        }
        instructions.push(Instruction {
            text: text.to_string(),
            line_number,
            comment_column: prefix.len(),
            in_define: false,
            starts_with_tab: line.starts_with_tab,
        });
    }
    ClassifiedLine::plain(LineClass::AlreadyEncoded {
        instructions,
        tokens,
    })
}

/// Packed rows start their comments at the comment column, or one space
/// after a literal that reaches it.
fn is_packed_row_prefix(prefix: &str, body: &str, config: &RewriterConfig) -> bool {
    prefix.len() == config.comment_column
        || (body.len() >= config.comment_column && prefix.len() == body.len() + 1)
}

/// Blank prefixes are placeholders when they are as wide as the configured
/// comment column, or as wide as a single-line literal of some encoding
/// length plus the spacing the layout puts before the comment.
fn is_placeholder_width(width: usize, in_define: bool, config: &RewriterConfig) -> bool {
    if width == config.comment_column {
        return true;
    }
    let spacing = if in_define { 3 } else { 1 };
    (1..=MAX_INSTRUCTION_BYTES).any(|bytes| natural_literal_len(bytes) + spacing == width)
}
