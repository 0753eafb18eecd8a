// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

/// Columns a tab expands to when lines are classified.
pub const TAB_WIDTH: usize = 4;
/// Comment delimiter separating the literal column from the instruction.
pub const COMMENT_DELIMITER: &str = "//";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    None,
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

/// Trivia-preserving source line.
///
/// `raw` is the line exactly as read; `expanded` has every tab replaced by
/// [`TAB_WIDTH`] spaces and is what classification and column arithmetic see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceLine {
    pub raw: String,
    pub expanded: String,
    pub starts_with_tab: bool,
    pub line_ending: LineEnding,
}

impl SurfaceLine {
    pub fn new(raw: &str, line_ending: LineEnding) -> Self {
        Self {
            raw: raw.to_string(),
            expanded: raw.replace('\t', &" ".repeat(TAB_WIDTH)),
            starts_with_tab: raw.starts_with('\t'),
            line_ending,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.raw.len() + 2);
        out.push_str(&self.raw);
        out.push_str(self.line_ending.as_str());
        out
    }

    /// Splits the expanded line into literal prefix and instruction text when
    /// it holds exactly one comment delimiter.
    pub fn comment_fields(&self) -> Option<(&str, &str)> {
        let (prefix, instruction) = self.expanded.split_once(COMMENT_DELIMITER)?;
        if instruction.contains(COMMENT_DELIMITER) {
            return None;
        }
        Some((prefix, instruction))
    }

    pub fn has_comment(&self) -> bool {
        self.expanded.contains(COMMENT_DELIMITER)
    }
}

/// Puts the leading tab back on a generated line when its source line had one.
pub fn restore_leading_tab(text: &str, starts_with_tab: bool) -> String {
    let spaces = " ".repeat(TAB_WIDTH);
    match text.strip_prefix(spaces.as_str()) {
        Some(rest) if starts_with_tab => format!("\t{rest}"),
        _ => text.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SurfaceDocument {
    pub lines: Vec<SurfaceLine>,
}

impl SurfaceDocument {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.render());
        }
        out
    }

    /// Line ending used for lines the rewriter inserts.
    pub fn preferred_line_ending(&self) -> LineEnding {
        self.lines
            .iter()
            .map(|line| line.line_ending)
            .find(|ending| *ending != LineEnding::None)
            .unwrap_or(LineEnding::Lf)
    }
}

pub fn tokenize_source(source: &str) -> SurfaceDocument {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let bytes = source.as_bytes();

    while start < bytes.len() {
        let mut end = start;
        while end < bytes.len() && bytes[end] != b'\n' {
            end += 1;
        }

        let (line_text, line_ending, next_start) = if end < bytes.len() {
            if end > start && bytes[end - 1] == b'\r' {
                (&source[start..end - 1], LineEnding::Crlf, end + 1)
            } else {
                (&source[start..end], LineEnding::Lf, end + 1)
            }
        } else {
            (&source[start..end], LineEnding::None, end)
        };

        lines.push(SurfaceLine::new(line_text, line_ending));
        start = next_start;
    }

    SurfaceDocument { lines }
}

#[cfg(test)]
mod tests {
    use super::{restore_leading_tab, tokenize_source, LineEnding};

    #[test]
    fn tokenizer_round_trips_tabs_and_line_endings() {
        let source = "\tMOVQ\tAX, BX // keep\r\n    // note\n\t\r\nlast";
        let doc = tokenize_source(source);
        assert_eq!(doc.lines.len(), 4);
        assert_eq!(doc.lines[0].line_ending, LineEnding::Crlf);
        assert_eq!(doc.lines[1].line_ending, LineEnding::Lf);
        assert_eq!(doc.lines[3].line_ending, LineEnding::None);
        assert_eq!(doc.render(), source);
        assert_eq!(doc.preferred_line_ending(), LineEnding::Crlf);
    }

    #[test]
    fn expanded_text_replaces_every_tab() {
        let doc = tokenize_source("\tVPXOR\tY0, Y0 // x\n");
        let line = &doc.lines[0];
        assert!(line.starts_with_tab);
        assert_eq!(line.expanded, "    VPXOR    Y0, Y0 // x");
        assert_eq!(line.comment_fields(), Some(("    VPXOR    Y0, Y0 ", " x")));
    }

    #[test]
    fn comment_fields_requires_exactly_one_delimiter() {
        let doc = tokenize_source("    MOVQ AX, BX\n  // a // b\n");
        assert_eq!(doc.lines[0].comment_fields(), None);
        assert!(!doc.lines[0].has_comment());
        assert_eq!(doc.lines[1].comment_fields(), None);
        assert!(doc.lines[1].has_comment());
    }

    #[test]
    fn restore_leading_tab_only_when_source_had_one() {
        assert_eq!(restore_leading_tab("    LONG $0x00000000", true), "\tLONG $0x00000000");
        assert_eq!(restore_leading_tab("    LONG $0x00000000", false), "    LONG $0x00000000");
        assert_eq!(restore_leading_tab("  x", true), "  x");
    }

    #[test]
    fn empty_source_has_no_lines() {
        let doc = tokenize_source("");
        assert!(doc.lines.is_empty());
        assert_eq!(doc.preferred_line_ending(), LineEnding::Lf);
    }
}
