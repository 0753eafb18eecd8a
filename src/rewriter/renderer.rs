// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Final text assembly for a rewrite plan.

use super::{LineEnding, RewritePlan, RewriterConfig, SurfaceDocument};

impl RewritePlan {
    /// Joins the planned lines into the rewritten text of `source`.
    ///
    /// With `preserve_line_endings` off every CRLF becomes LF. The result
    /// ends with a newline exactly when the source did, unless
    /// `preserve_final_newline` is off, in which case it never does.
    pub fn render(&self, source: &SurfaceDocument, config: &RewriterConfig) -> String {
        let mut out = String::new();
        for line in self.output_lines() {
            out.push_str(&line.raw);
            out.push_str(output_ending(line.line_ending, config).as_str());
        }

        let source_ends_line = source
            .lines
            .last()
            .is_some_and(|line| line.line_ending != LineEnding::None);
        let wants_final_newline = config.preserve_final_newline && source_ends_line;
        if out.ends_with('\n') {
            if !wants_final_newline {
                out.pop();
                if out.ends_with('\r') {
                    out.pop();
                }
            }
        } else if wants_final_newline && !out.is_empty() {
            let ending = output_ending(source.preferred_line_ending(), config);
            out.push_str(ending.as_str());
        }
        out
    }
}

fn output_ending(ending: LineEnding, config: &RewriterConfig) -> LineEnding {
    match ending {
        LineEnding::Crlf if !config.preserve_line_endings => LineEnding::Lf,
        ending => ending,
    }
}

#[cfg(test)]
mod tests {
    use crate::rewriter::{
        classify_document, plan_document, tokenize_source, EncodingTable, InstructionKey,
        RewriterConfig,
    };

    fn render(source: &str, encodings: &[(usize, Vec<u8>)], config: &RewriterConfig) -> String {
        let doc = tokenize_source(source);
        let classified = classify_document(&doc, config);
        let table: EncodingTable = encodings
            .iter()
            .map(|(line, bytes)| (InstructionKey::new(*line, 0), bytes.clone()))
            .collect();
        let plan = plan_document(&doc, &classified, &table, config).expect("plan");
        plan.render(&doc, config)
    }

    #[test]
    fn renderer_preserves_line_endings_by_default() {
        let source = "    MOVQ AX, BX // copy\r\n";
        assert_eq!(render(source, &[], &RewriterConfig::default()), source);
    }

    #[test]
    fn renderer_can_normalize_line_endings_to_lf() {
        let source = "    MOVQ AX, BX // copy\r\nRET\r\n";
        let config = RewriterConfig {
            preserve_line_endings: false,
            ..RewriterConfig::default()
        };
        assert_eq!(render(source, &[], &config), "    MOVQ AX, BX // copy\nRET\n");
    }

    #[test]
    fn renderer_keeps_missing_final_newline_after_continuation() {
        // The dropped continuation was the last line and had no newline.
        let source = format!("{}// BIG\n    BYTE $0x00", " ".repeat(65));
        let bytes: Vec<u8> = (1..=8).collect();
        let rendered = render(&source, &[(0, bytes)], &RewriterConfig::default());
        assert!(!rendered.ends_with('\n'));
        assert!(rendered.starts_with("    QUAD $0x0807060504030201"));
        assert_eq!(rendered.lines().count(), 1);
    }

    #[test]
    fn renderer_respects_final_newline_policy() {
        let source = "RET";
        let keep_config = RewriterConfig {
            preserve_final_newline: true,
            ..RewriterConfig::default()
        };
        assert_eq!(render(source, &[], &keep_config), "RET");

        let drop_config = RewriterConfig {
            preserve_final_newline: false,
            ..RewriterConfig::default()
        };
        assert_eq!(render("RET\n", &[], &drop_config), "RET");
        assert_eq!(render("RET\r\n", &[], &drop_config), "RET");
    }

    #[test]
    fn regenerated_owner_keeps_crlf_when_continuation_is_dropped() {
        let source = format!("{}// BIG\r\n    BYTE $0x00\r\n", " ".repeat(65));
        let bytes: Vec<u8> = (1..=8).collect();
        let rendered = render(&source, &[(0, bytes)], &RewriterConfig::default());
        assert_eq!(
            rendered,
            format!("{:<65}// BIG\r\n", "    QUAD $0x0807060504030201")
        );
    }
}
