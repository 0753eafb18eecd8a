// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! GNU `as` backend. A whole batch is assembled in one run and the listing
//! file is split back into per-instruction encodings by source line.

use std::fs;
use std::process::Command;
use std::time::Duration;

use log::debug;

use super::listing::{demultiplex, parse_listing};
use super::session::EncoderSession;
use super::{locate_diagnostic, BackendError, EncoderBackend, OracleInput};
use crate::rewriter::{BitMode, RewriterConfig};

const BACKEND: &str = "GAS";
/// Directive lines written ahead of the instructions.
const PREAMBLE_LINES: usize = 2;

#[derive(Debug, Clone)]
pub struct GasBackend {
    program: String,
    mode: BitMode,
    timeout: Duration,
}

impl GasBackend {
    pub fn new(program: impl Into<String>, mode: BitMode, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            mode,
            timeout,
        }
    }

    pub fn from_config(config: &RewriterConfig) -> Self {
        Self::new(config.gas_path.clone(), config.bits, config.timeout())
    }

    fn source_text(&self, inputs: &[OracleInput]) -> String {
        let mut text = format!(".intel_syntax noprefix\n.code{}\n", self.mode.bits());
        for input in inputs {
            text.push_str(&input.text);
            text.push('\n');
        }
        text
    }

    fn assemble(
        &self,
        session: &EncoderSession,
        inputs: &[OracleInput],
    ) -> Result<Vec<Vec<u8>>, BackendError> {
        let run = ListingAssembly {
            backend: BACKEND,
            program: &self.program,
            target_args: &[],
            preamble_lines: PREAMBLE_LINES,
        };
        run.assemble(session, &self.source_text(inputs), inputs)
    }
}

/// One GNU `as` run whose listing is split back into per-instruction
/// encodings. Instruction `k` sits on source line `preamble_lines + 1 + k`.
pub(crate) struct ListingAssembly<'a> {
    pub backend: &'static str,
    pub program: &'a str,
    /// Flags placed ahead of the output options, such as `-march=...`.
    pub target_args: &'a [&'a str],
    pub preamble_lines: usize,
}

impl ListingAssembly<'_> {
    pub fn assemble(
        &self,
        session: &EncoderSession,
        source_text: &str,
        inputs: &[OracleInput],
    ) -> Result<Vec<Vec<u8>>, BackendError> {
        let backend = self.backend;
        let source = session
            .write_work_file("oracle.s", source_text)
            .map_err(|err| BackendError::resource("failed to write assembler input", err))?;
        let object = session.work_file("oracle.o");
        let listing = session.work_file("oracle.lis");

        let mut command = Command::new(self.program);
        command
            .args(self.target_args)
            .arg("-o")
            .arg(&object)
            .arg(format!("-al={}", listing.display()))
            .arg(&source);
        let output = session.invoke(backend, self.program, command, &inputs[0])?;

        if !output.success() {
            let combined = output.combined();
            return Err(match locate_diagnostic(&combined, &source) {
                Some((line, message)) => {
                    let blamed = line
                        .checked_sub(self.preamble_lines + 1)
                        .and_then(|index| inputs.get(index))
                        .unwrap_or(&inputs[0]);
                    BackendError::rejected(backend, blamed, message)
                }
                None => BackendError::rejected(backend, &inputs[0], combined.trim()),
            });
        }

        let text = fs::read(&listing)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|err| BackendError::resource("failed to read assembler listing", err))?;
        let by_line = parse_listing(&text)
            .map_err(|detail| BackendError::Correlation { backend, detail })?;
        let encodings = demultiplex(&by_line, self.preamble_lines + 1, inputs.len())
            .map_err(|detail| BackendError::Correlation { backend, detail })?;
        debug!("{backend}: encoded {} instruction(s)", encodings.len());
        Ok(encodings)
    }
}

impl EncoderBackend for GasBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn encode(&self, input: &OracleInput) -> Result<Vec<u8>, BackendError> {
        let mut encodings = self.encode_batch(std::slice::from_ref(input))?;
        encodings.pop().ok_or_else(|| BackendError::Correlation {
            backend: BACKEND,
            detail: format!("no encoding for line {}", input.line_number),
        })
    }

    fn encode_batch(&self, inputs: &[OracleInput]) -> Result<Vec<Vec<u8>>, BackendError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        EncoderSession::scoped(self.timeout, |session| self.assemble(session, inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_places_instruction_k_on_line_k_plus_three() {
        let backend = GasBackend::new("as", BitMode::Bits64, Duration::from_secs(1));
        let inputs = [
            OracleInput::new(10, " VPADDQ XMM0,XMM1,XMM8"),
            OracleInput::new(11, " NOP /* pad */"),
        ];
        let source = backend.source_text(&inputs);
        let lines: Vec<&str> = source.lines().collect();
        assert_eq!(lines[0], ".intel_syntax noprefix");
        assert_eq!(lines[1], ".code64");
        assert_eq!(lines[PREAMBLE_LINES], "VPADDQ XMM0,XMM1,XMM8");
        assert_eq!(lines[PREAMBLE_LINES + 1], "NOP");
    }

    #[test]
    fn bit_mode_selects_code_directive() {
        let backend = GasBackend::new("as", BitMode::Bits32, Duration::from_secs(1));
        assert!(backend.source_text(&[]).contains(".code32\n"));
    }

    #[test]
    fn missing_assembler_is_unavailable() {
        let backend = GasBackend::new(
            "plan9enc-missing-as",
            BitMode::Bits64,
            Duration::from_secs(1),
        );
        let err = backend
            .encode(&OracleInput::new(1, " NOP"))
            .expect_err("missing assembler");
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }
}
