// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! GNU `as` backend for arm64. Instructions are assembled for armv8-a with
//! the crypto extension; every encoding is a sequence of 32-bit words.

use std::time::Duration;

use super::gas::ListingAssembly;
use super::session::EncoderSession;
use super::{BackendError, EncoderBackend, OracleInput};
use crate::rewriter::RewriterConfig;

const BACKEND: &str = "GAS";
const TARGET_ARGS: [&str; 1] = ["-march=armv8-a+crypto"];
const INSTRUCTION_WORD: usize = 4;

#[derive(Debug, Clone)]
pub struct Arm64GasBackend {
    program: String,
    timeout: Duration,
}

impl Arm64GasBackend {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RewriterConfig) -> Self {
        Self::new(config.gas_path.clone(), config.timeout())
    }

    fn source_text(inputs: &[OracleInput]) -> String {
        let mut text = String::new();
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
            target_args: &TARGET_ARGS,
            preamble_lines: 0,
        };
        let encodings = run.assemble(session, &Self::source_text(inputs), inputs)?;
        check_instruction_words(&encodings, inputs)?;
        Ok(encodings)
    }
}

fn check_instruction_words(
    encodings: &[Vec<u8>],
    inputs: &[OracleInput],
) -> Result<(), BackendError> {
    for (encoding, input) in encodings.iter().zip(inputs) {
        if encoding.len() % INSTRUCTION_WORD != 0 {
            return Err(BackendError::Correlation {
                backend: BACKEND,
                detail: format!(
                    "line {}: {} byte(s) is not a whole number of instruction words",
                    input.line_number,
                    encoding.len()
                ),
            });
        }
    }
    Ok(())
}

impl EncoderBackend for Arm64GasBackend {
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
    use crate::oracle::listing::{demultiplex, parse_listing};
    use crate::rewriter::{join_tokens, slice_encoding, TokenSet};

    const LISTING: &str = "AARCH64 GAS  /tmp/plan9enc-x/oracle.s \t\t\tpage 1\n\
                           \n\
                           \n\
                           \x20  1 0000 2048284E \taese v0.16b, v1.16b\n\
                           \x20  2 0004 E00301AA \tmov x0, x1\n";

    #[test]
    fn listing_rows_become_little_endian_words() {
        let by_line = parse_listing(LISTING).expect("listing");
        let encodings = demultiplex(&by_line, 1, 2).expect("demux");
        assert_eq!(
            encodings,
            vec![vec![0x20, 0x48, 0x28, 0x4e], vec![0xe0, 0x03, 0x01, 0xaa]]
        );
        let words: Vec<String> = encodings
            .iter()
            .map(|bytes| join_tokens(&slice_encoding(bytes, TokenSet::Arm64)))
            .collect();
        assert_eq!(words, vec!["WORD $0x4e284820", "WORD $0xaa0103e0"]);
    }

    #[test]
    fn source_holds_one_instruction_per_line() {
        let inputs = [
            OracleInput::new(4, " AESE V0.B16, V1.B16 ; round"),
            OracleInput::new(5, " mov x0, x1"),
        ];
        assert_eq!(
            Arm64GasBackend::source_text(&inputs),
            "AESE V0.B16, V1.B16\nmov x0, x1\n"
        );
    }

    #[test]
    fn partial_instruction_word_fails_correlation() {
        let inputs = [OracleInput::new(7, " mov x0, x1")];
        let err = check_instruction_words(&[vec![0xe0, 0x03, 0x01]], &inputs)
            .expect_err("three bytes");
        assert!(err.to_string().contains("line 7"), "{err}");
    }

    #[test]
    fn rejection_names_gas_line_and_instruction() {
        let err = BackendError::rejected(
            BACKEND,
            &OracleInput::new(12, " ldr x0, [x1, #3]"),
            "unaligned offset",
        );
        assert!(err
            .to_string()
            .starts_with("GAS error (line 12 for 'ldr x0, [x1, #3]'):"));
    }

    #[test]
    fn missing_assembler_is_unavailable() {
        let backend = Arm64GasBackend::new("plan9enc-missing-as", Duration::from_secs(1));
        let err = backend
            .encode(&OracleInput::new(1, " mov x0, x1"))
            .expect_err("missing assembler");
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }
}
