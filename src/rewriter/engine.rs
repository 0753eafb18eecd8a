// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use super::{
    classify_document, collect_ambiguity_diagnostics, plan_document, tokenize_source,
    ClassifiedDocument, EncodingTable, InstructionKey, RewriteDiagnostic, RewriteError,
    RewriterConfig,
};
use crate::oracle::{OracleChain, OracleInput};

/// Rewriter execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    Check,
    Write,
    Stdout,
}

/// Aggregate rewriter run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewriteRunSummary {
    pub files_seen: usize,
    pub files_changed: usize,
    pub instructions_encoded: usize,
    pub warnings: usize,
    pub files_with_warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub rendered: String,
    pub diagnostics: Vec<RewriteDiagnostic>,
    pub instructions_encoded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteFileReport {
    pub path: PathBuf,
    pub changed: bool,
    pub instructions_encoded: usize,
    pub diagnostics: Vec<RewriteDiagnostic>,
    /// Rewritten text, kept only in [`RewriteMode::Stdout`].
    pub rendered: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewriteRunReport {
    pub summary: RewriteRunSummary,
    pub files: Vec<RewriteFileReport>,
}

/// Rewrites placeholder comments into literal encodings using an oracle chain.
pub struct RewriteEngine {
    config: RewriterConfig,
    oracle: OracleChain,
}

impl RewriteEngine {
    pub fn new(config: RewriterConfig) -> Self {
        let oracle = OracleChain::from_config(&config);
        Self { config, oracle }
    }

    pub fn with_oracle(config: RewriterConfig, oracle: OracleChain) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &RewriterConfig {
        &self.config
    }

    pub fn rewrite_source_with_diagnostics(
        &self,
        source: &str,
    ) -> Result<RewriteOutput, RewriteError> {
        let doc = tokenize_source(source);
        let classified = classify_document(&doc, &self.config);
        let diagnostics = collect_ambiguity_diagnostics(&classified);
        for diagnostic in &diagnostics {
            warn!("line {}: {}", diagnostic.line_number, diagnostic.message);
        }

        let encodings = self.encode_requests(&classified)?;
        let plan = plan_document(&doc, &classified, &encodings, &self.config)?;
        debug!(
            "{} instruction(s) encoded into {} line(s)",
            encodings.len(),
            plan.generated_line_count()
        );
        let rendered = plan.render(&doc, &self.config);
        Ok(RewriteOutput {
            rendered,
            diagnostics,
            instructions_encoded: encodings.len(),
        })
    }

    pub fn rewrite_source(&self, source: &str) -> Result<String, RewriteError> {
        Ok(self.rewrite_source_with_diagnostics(source)?.rendered)
    }

    pub fn rewrite_path_to_string(&self, path: &Path) -> Result<String, RewriteError> {
        let input = read_source(path)?;
        self.rewrite_source(&input)
    }

    pub fn run_paths(
        &self,
        paths: &[PathBuf],
        mode: RewriteMode,
    ) -> Result<RewriteRunSummary, RewriteError> {
        let report = self.run_paths_with_report(paths, mode)?;
        Ok(report.summary)
    }

    /// Rewrites every path. All files are processed before any is written,
    /// so a failure leaves every input untouched.
    pub fn run_paths_with_report(
        &self,
        paths: &[PathBuf],
        mode: RewriteMode,
    ) -> Result<RewriteRunReport, RewriteError> {
        let mut report = RewriteRunReport {
            summary: RewriteRunSummary::default(),
            files: Vec::with_capacity(paths.len()),
        };
        let mut pending_writes = Vec::new();

        for path in paths {
            info!("Processing file {}", path.display());
            report.summary.files_seen += 1;
            let input = read_source(path)?;
            let output = self.rewrite_source_with_diagnostics(&input)?;
            let changed = output.rendered != input;
            report.summary.instructions_encoded += output.instructions_encoded;
            if changed {
                report.summary.files_changed += 1;
            }
            if !output.diagnostics.is_empty() {
                report.summary.warnings += output.diagnostics.len();
                report.summary.files_with_warnings += 1;
            }
            let rendered = match mode {
                RewriteMode::Write if changed => {
                    pending_writes.push((path.clone(), output.rendered));
                    None
                }
                RewriteMode::Stdout => Some(output.rendered),
                _ => None,
            };
            report.files.push(RewriteFileReport {
                path: path.clone(),
                changed,
                instructions_encoded: output.instructions_encoded,
                diagnostics: output.diagnostics,
                rendered,
            });
        }

        for (path, contents) in pending_writes {
            replace_file(&path, &contents)?;
            debug!("rewrote {}", path.display());
        }
        Ok(report)
    }

    fn encode_requests(
        &self,
        classified: &ClassifiedDocument,
    ) -> Result<EncodingTable, RewriteError> {
        let (keys, inputs): (Vec<InstructionKey>, Vec<OracleInput>) = classified
            .instructions()
            .map(|(key, instruction)| {
                (
                    key,
                    OracleInput::new(instruction.line_number, &instruction.text),
                )
            })
            .unzip();
        if inputs.is_empty() {
            return Ok(EncodingTable::new());
        }

        let encodings = if self.config.batch {
            self.oracle.encode_batch(&inputs)?
        } else {
            inputs
                .iter()
                .map(|input| self.oracle.encode(input))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(keys.into_iter().zip(encodings).collect())
    }
}

fn read_source(path: &Path) -> Result<String, RewriteError> {
    fs::read_to_string(path).map_err(|err| RewriteError::io("read", path, err))
}

/// Replaces `path` with `contents` through a temporary file in the same
/// directory, so the original stays intact if writing fails.
fn replace_file(path: &Path, contents: &str) -> Result<(), RewriteError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp =
        NamedTempFile::new_in(parent).map_err(|err| RewriteError::io("stage", path, err))?;
    temp.write_all(contents.as_bytes())
        .map_err(|err| RewriteError::io("write", path, err))?;
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|err| RewriteError::io("write", path, err))?;
    }
    temp.persist(path)
        .map_err(|err| RewriteError::io("replace", path, err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{RewriteEngine, RewriteMode};
    use crate::oracle::{OracleChain, TableBackend};
    use crate::rewriter::{RewriteError, RewriterConfig};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const VPADDQ_X: &[u8] = &[0xc4, 0xc1, 0x71, 0xd4, 0xc0];
    const VPADDQ_Y: &[u8] = &[0xc4, 0xc1, 0x75, 0xd4, 0xc0];

    fn engine(config: RewriterConfig) -> RewriteEngine {
        let table = TableBackend::new()
            .with_entry("VPADDQ XMM0,XMM1,XMM8", VPADDQ_X)
            .with_entry("VPADDQ YMM0,YMM1,YMM8", VPADDQ_Y)
            .with_entry("VPXOR YMM0,YMM0,YMM0", &[0xc5, 0xfd, 0xef, 0xc0])
            .with_entry("NOP", &[0x90]);
        RewriteEngine::with_oracle(config, OracleChain::new(vec![Box::new(table)]))
    }

    fn placeholder(instruction: &str) -> String {
        format!("{}//{instruction}\n", " ".repeat(65))
    }

    #[test]
    fn rewrite_source_encodes_placeholder() {
        let engine = engine(RewriterConfig::default());
        let source = format!("TEXT ·add(SB),7,$0\n{}    RET\n", placeholder(" VPADDQ  XMM0,XMM1,XMM8"));
        let rendered = engine.rewrite_source(&source).expect("rewrite");
        assert_eq!(
            rendered,
            format!(
                "TEXT ·add(SB),7,$0\n    LONG $0xd471c1c4; BYTE $0xc0{}// VPADDQ  XMM0,XMM1,XMM8\n    RET\n",
                " ".repeat(65 - 32)
            )
        );
    }

    #[test]
    fn rewrite_source_is_idempotent() {
        for pack in [false, true] {
            let engine = engine(RewriterConfig {
                pack,
                ..RewriterConfig::default()
            });
            let source = format!(
                "{}{}{}",
                placeholder(" VPADDQ  XMM0,XMM1,XMM8"),
                placeholder(" VPADDQ  YMM0,YMM1,YMM8"),
                placeholder(" NOP")
            );
            let once = engine.rewrite_source(&source).expect("first pass");
            let twice = engine.rewrite_source(&once).expect("second pass");
            assert_eq!(once, twice, "pack = {pack}");
        }
    }

    #[test]
    fn encode_error_names_source_line_and_instruction() {
        let engine = engine(RewriterConfig::default());
        let source = format!("    RET\n\n{}", placeholder(" VPADDQ XMM0, XMM1, XMM99"));
        let err = engine.rewrite_source(&source).expect_err("unknown instruction");
        let RewriteError::Encode {
            line_number,
            instruction,
            ..
        } = &err
        else {
            panic!("expected encode error");
        };
        assert_eq!(*line_number, 3);
        assert_eq!(instruction, "VPADDQ XMM0, XMM1, XMM99");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn per_instruction_mode_matches_batch_mode() {
        let source = format!(
            "{}{}",
            placeholder(" VPADDQ  XMM0,XMM1,XMM8"),
            placeholder(" NOP")
        );
        let batch = engine(RewriterConfig::default())
            .rewrite_source(&source)
            .expect("batch");
        let single = engine(RewriterConfig {
            batch: false,
            ..RewriterConfig::default()
        })
        .rewrite_source(&source)
        .expect("single");
        assert_eq!(batch, single);
    }

    #[test]
    fn rewrite_reports_ambiguous_lines_and_keeps_them() {
        let engine = engine(RewriterConfig::default());
        let source = "    LONG $0xd471c1 // VPADDQ XMM0,XMM1,XMM8\n";
        let output = engine
            .rewrite_source_with_diagnostics(source)
            .expect("rewrite");
        assert_eq!(output.rendered, source);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].line_number, 1);
        assert_eq!(output.instructions_encoded, 0);
    }

    #[test]
    fn run_paths_counts_seen_and_changed_for_check_mode() {
        let (_dir, file) = create_temp_file("    RET\n");
        let engine = engine(RewriterConfig::default());
        let summary = engine
            .run_paths(std::slice::from_ref(&file), RewriteMode::Check)
            .expect("run rewriter");
        assert_eq!(summary.files_seen, 1);
        assert_eq!(summary.files_changed, 0);
    }

    #[test]
    fn run_paths_write_mode_replaces_file() {
        let source = placeholder(" NOP");
        let (_dir, file) = create_temp_file(&source);
        let engine = engine(RewriterConfig::default());
        let report = engine
            .run_paths_with_report(std::slice::from_ref(&file), RewriteMode::Write)
            .expect("run rewriter");
        assert_eq!(report.summary.files_changed, 1);
        assert_eq!(report.summary.instructions_encoded, 1);
        let written = fs::read_to_string(&file).expect("read back");
        assert!(written.starts_with("    BYTE $0x90 "));
        assert_eq!(report.files[0].rendered, None);
    }

    #[test]
    fn failed_run_writes_nothing() {
        let good = placeholder(" NOP");
        let (_dir_a, first) = create_temp_file(&good);
        let (_dir_b, second) = create_temp_file(&placeholder(" BOGUS"));
        let engine = engine(RewriterConfig::default());
        let err = engine
            .run_paths_with_report(&[first.clone(), second], RewriteMode::Write)
            .expect_err("second file fails");
        assert!(matches!(err, RewriteError::Encode { .. }));
        assert_eq!(fs::read_to_string(&first).expect("read back"), good);
    }

    #[test]
    fn stdout_mode_returns_rendered_text() {
        let (_dir, file) = create_temp_file(&placeholder(" NOP"));
        let engine = engine(RewriterConfig::default());
        let report = engine
            .run_paths_with_report(std::slice::from_ref(&file), RewriteMode::Stdout)
            .expect("run rewriter");
        let rendered = report.files[0].rendered.as_deref().expect("rendered");
        assert!(rendered.ends_with("// NOP\n"));
        assert_eq!(
            fs::read_to_string(&file).expect("read back"),
            placeholder(" NOP")
        );
        assert_eq!(
            engine.rewrite_path_to_string(&file).expect("to string"),
            rendered
        );
    }

    fn create_temp_file(content: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sample.s");
        fs::write(&path, content).expect("write temp file");
        (dir, path)
    }
}
