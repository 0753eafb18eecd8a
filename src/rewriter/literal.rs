// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Literal pseudo-op tokens (`QUAD`/`LONG`/`WORD`/`BYTE`) and greedy width slicing.
//!
//! The arm64 assembler spells a 32-bit instruction word `WORD`, so the same
//! keyword reads as two or four bytes depending on its digit count.

use std::fmt::{Display, Formatter};

/// Indentation of the literal column.
pub const LITERAL_INDENT: &str = "    ";
/// Separator placed between tokens on one physical line.
pub const TOKEN_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenWidth {
    Quad,
    Long,
    Word,
    Byte,
    /// arm64 instruction word.
    Arm64Word,
}

impl TokenWidth {
    pub const fn bytes(self) -> usize {
        match self {
            Self::Quad => 8,
            Self::Long | Self::Arm64Word => 4,
            Self::Word => 2,
            Self::Byte => 1,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Quad => "QUAD",
            Self::Long => "LONG",
            Self::Word | Self::Arm64Word => "WORD",
            Self::Byte => "BYTE",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "QUAD" => Some(Self::Quad),
            "LONG" => Some(Self::Long),
            "WORD" => Some(Self::Word),
            "BYTE" => Some(Self::Byte),
            _ => None,
        }
    }

    /// Rendered length of one token, e.g. `LONG $0xd471c1c4` is 16.
    pub const fn rendered_len(self) -> usize {
        self.keyword().len() + " $0x".len() + self.bytes() * 2
    }

    /// Largest width that fits into `remaining` bytes.
    fn greedy(remaining: usize) -> Option<Self> {
        match remaining {
            0 => None,
            1 => Some(Self::Byte),
            2..=3 => Some(Self::Word),
            4..=7 => Some(Self::Long),
            _ => Some(Self::Quad),
        }
    }
}

/// Pseudo-op family an encoding is sliced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenSet {
    /// Greedy `QUAD`/`LONG`/`WORD`/`BYTE`.
    #[default]
    Amd64,
    /// One 32-bit `WORD` per instruction word.
    Arm64,
}

/// One literal pseudo-op holding a little-endian slice of an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    width: TokenWidth,
    value: u64,
}

impl Token {
    /// Builds a token from 1, 2, 4 or 8 bytes in encoding order.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let width = match bytes.len() {
            8 => TokenWidth::Quad,
            4 => TokenWidth::Long,
            2 => TokenWidth::Word,
            1 => TokenWidth::Byte,
            _ => return None,
        };
        Some(Self::with_width(width, bytes))
    }

    fn with_width(width: TokenWidth, bytes: &[u8]) -> Self {
        let value = bytes
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        Self { width, value }
    }

    pub fn width(&self) -> TokenWidth {
        self.width
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.value.to_le_bytes()[..self.width.bytes()].to_vec()
    }

    pub fn rendered_len(&self) -> usize {
        self.width.rendered_len()
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} $0x{:0digits$x}",
            self.width.keyword(),
            self.value,
            digits = self.width.bytes() * 2
        )
    }
}

/// Slices an encoding into tokens: QUADs while at least 8 bytes remain, then
/// at most one LONG, one WORD and one BYTE.
pub fn slice_tokens(bytes: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(bytes.len() / 8 + 3);
    let mut rest = bytes;
    while let Some(width) = TokenWidth::greedy(rest.len()) {
        let (head, tail) = rest.split_at(width.bytes());
        if let Some(token) = Token::from_le_bytes(head) {
            tokens.push(token);
        }
        rest = tail;
    }
    tokens
}

/// Slices an encoding with the pseudo-ops of `set`. An arm64 encoding whose
/// length is not a multiple of four keeps greedy tokens for its tail.
pub fn slice_encoding(bytes: &[u8], set: TokenSet) -> Vec<Token> {
    match set {
        TokenSet::Amd64 => slice_tokens(bytes),
        TokenSet::Arm64 => {
            let words = bytes.chunks_exact(4);
            let tail = words.remainder();
            let mut tokens: Vec<Token> = words
                .map(|word| Token::with_width(TokenWidth::Arm64Word, word))
                .collect();
            tokens.extend(slice_tokens(tail));
            tokens
        }
    }
}

pub fn tokens_to_bytes(tokens: &[Token]) -> Vec<u8> {
    tokens.iter().flat_map(Token::to_le_bytes).collect()
}

/// Tokens joined with the separator, without indentation.
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(TOKEN_SEPARATOR)
}

/// Indented literal text as it appears in the literal column.
pub fn literal_text(tokens: &[Token]) -> String {
    format!("{LITERAL_INDENT}{}", join_tokens(tokens))
}

pub fn literal_len(tokens: &[Token]) -> usize {
    let body: usize = tokens.iter().map(Token::rendered_len).sum();
    LITERAL_INDENT.len() + body + TOKEN_SEPARATOR.len() * tokens.len().saturating_sub(1)
}

/// Width of the single-line literal for an encoding of `byte_count` bytes.
pub fn natural_literal_len(byte_count: usize) -> usize {
    let mut widths = Vec::new();
    let mut remaining = byte_count;
    while let Some(width) = TokenWidth::greedy(remaining) {
        widths.push(width);
        remaining -= width.bytes();
    }
    let body: usize = widths.iter().map(|width| width.rendered_len()).sum();
    LITERAL_INDENT.len() + body + TOKEN_SEPARATOR.len() * widths.len().saturating_sub(1)
}

/// Result of matching text against the literal-token grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralMatch {
    /// The whole text is indented token syntax.
    Tokens(Vec<Token>),
    /// The text starts like a literal but does not match the grammar.
    Partial,
    NotLiteral,
}

/// Matches `    TOK $0x<hex>[; TOK $0x<hex>]*` with nothing trailing.
pub fn match_literal(text: &str) -> LiteralMatch {
    let trimmed = text.trim_start_matches(' ');
    if !starts_with_token(trimmed) {
        return LiteralMatch::NotLiteral;
    }
    if text.len() - trimmed.len() != LITERAL_INDENT.len() {
        return LiteralMatch::Partial;
    }

    let mut tokens = Vec::new();
    for piece in trimmed.split(TOKEN_SEPARATOR) {
        match parse_token(piece) {
            Some(token) => tokens.push(token),
            None => return LiteralMatch::Partial,
        }
    }
    LiteralMatch::Tokens(tokens)
}

fn starts_with_token(text: &str) -> bool {
    let keyword = text.get(..4).and_then(TokenWidth::from_keyword);
    keyword.is_some() && text.get(4..8) == Some(" $0x")
}

fn parse_token(piece: &str) -> Option<Token> {
    let (keyword, rest) = piece.split_once(' ')?;
    let digits = rest.strip_prefix("$0x")?;
    let width = match TokenWidth::from_keyword(keyword)? {
        TokenWidth::Word if digits.len() == 8 => TokenWidth::Arm64Word,
        width => width,
    };
    if digits.len() != width.bytes() * 2
        || !digits
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
    {
        return None;
    }
    let value = u64::from_str_radix(digits, 16).ok()?;
    Some(Token { width, value })
}
