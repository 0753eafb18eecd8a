// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! YASM backend. Each instruction is assembled on its own into a flat binary
//! whose contents are the encoding.

use std::fs;
use std::process::Command;
use std::time::Duration;

use super::session::EncoderSession;
use super::{locate_diagnostic, BackendError, EncoderBackend, OracleInput};
use crate::rewriter::{BitMode, RewriterConfig};

const BACKEND: &str = "YASM";

#[derive(Debug, Clone)]
pub struct YasmBackend {
    program: String,
    mode: BitMode,
    timeout: Duration,
}

impl YasmBackend {
    pub fn new(program: impl Into<String>, mode: BitMode, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            mode,
            timeout,
        }
    }

    pub fn from_config(config: &RewriterConfig) -> Self {
        Self::new(config.yasm_path.clone(), config.bits, config.timeout())
    }

    fn source_text(&self, input: &OracleInput) -> String {
        format!("[bits {}]\n{}\n", self.mode.bits(), input.text)
    }

    fn assemble(
        &self,
        session: &EncoderSession,
        input: &OracleInput,
    ) -> Result<Vec<u8>, BackendError> {
        let source = session
            .write_work_file("oracle.asm", &self.source_text(input))
            .map_err(|err| BackendError::resource("failed to write assembler input", err))?;
        let object = session.work_file("oracle.bin");

        let mut command = Command::new(&self.program);
        command.arg("-o").arg(&object).arg(&source);
        let output = session
            .invoke(BACKEND, &self.program, command, input)
            .map_err(|err| match err {
                BackendError::Unavailable { backend, .. } => BackendError::Unavailable {
                    backend,
                    detail: "YASM not installed?".to_string(),
                },
                other => other,
            })?;

        if !output.success() {
            let combined = output.combined();
            let diagnostic = locate_diagnostic(&combined, &source)
                .map(|(_, message)| message)
                .unwrap_or_else(|| combined.trim().to_string());
            return Err(BackendError::rejected(BACKEND, input, diagnostic));
        }

        let bytes = fs::read(&object)
            .map_err(|err| BackendError::resource("failed to read assembler output", err))?;
        if bytes.is_empty() {
            return Err(BackendError::rejected(BACKEND, input, "no bytes produced"));
        }
        Ok(bytes)
    }
}

impl EncoderBackend for YasmBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn encode(&self, input: &OracleInput) -> Result<Vec<u8>, BackendError> {
        EncoderSession::scoped(self.timeout, |session| self.assemble(session, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_carries_bits_directive() {
        let backend = YasmBackend::new("yasm", BitMode::Bits16, Duration::from_secs(1));
        assert_eq!(
            backend.source_text(&OracleInput::new(1, " MOV AX, BX ; copy")),
            "[bits 16]\nMOV AX, BX\n"
        );
    }

    #[test]
    fn missing_yasm_is_unavailable() {
        let backend = YasmBackend::new(
            "plan9enc-missing-yasm",
            BitMode::Bits64,
            Duration::from_secs(1),
        );
        let err = backend
            .encode(&OracleInput::new(1, " NOP"))
            .expect_err("missing yasm");
        assert!(
            matches!(err, BackendError::Unavailable { ref detail, .. } if detail == "YASM not installed?")
        );
    }
}
