// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Encoder backends ("oracles") that turn instruction text into machine code.

pub mod arm64;
pub mod gas;
pub mod listing;
pub mod session;
pub mod table;
pub mod yasm;

use std::io;
use std::path::Path;

use log::{debug, warn};
use thiserror::Error;

use crate::rewriter::{BackendKind, RewriteError, RewriterConfig};

pub use arm64::Arm64GasBackend;
pub use gas::GasBackend;
pub use session::{EncoderSession, ToolOutcome, ToolOutput};
pub use table::TableBackend;
pub use yasm::YasmBackend;

/// Trailing comment markers an assembler would misread as part of the
/// instruction.
const INLINE_COMMENT_MARKERS: [&str; 2] = ["/*", ";"];

/// Cuts the instruction at the first inline comment marker and trims it.
pub fn strip_inline_comment(text: &str) -> &str {
    let end = INLINE_COMMENT_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..end].trim()
}

/// One instruction submitted to an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleInput {
    pub line_number: usize,
    /// Text handed to the assembler.
    pub text: String,
    /// Trimmed source text, quoted in diagnostics.
    pub original: String,
}

impl OracleInput {
    pub fn new(line_number: usize, source_text: &str) -> Self {
        Self {
            line_number,
            text: strip_inline_comment(source_text).to_string(),
            original: source_text.trim().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend} is unavailable: {detail}")]
    Unavailable {
        backend: &'static str,
        detail: String,
    },

    #[error("{backend} error (line {line_number} for '{instruction}'): {diagnostic}")]
    Rejected {
        backend: &'static str,
        line_number: usize,
        instruction: String,
        diagnostic: String,
    },

    #[error("{backend} output could not be matched to the submitted instructions: {detail}")]
    Correlation {
        backend: &'static str,
        detail: String,
    },

    #[error("{context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl BackendError {
    pub fn rejected(
        backend: &'static str,
        input: &OracleInput,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            backend,
            line_number: input.line_number,
            instruction: input.original.clone(),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn resource(context: impl Into<String>, source: io::Error) -> Self {
        Self::Resource {
            context: context.into(),
            source,
        }
    }
}

pub trait EncoderBackend {
    fn name(&self) -> &'static str;

    fn encode(&self, input: &OracleInput) -> Result<Vec<u8>, BackendError>;

    /// Encodes several instructions; the result is in submission order.
    fn encode_batch(&self, inputs: &[OracleInput]) -> Result<Vec<Vec<u8>>, BackendError> {
        inputs.iter().map(|input| self.encode(input)).collect()
    }
}

/// Finds the first `<path>:<line>: error: <message>` diagnostic an assembler
/// printed for `source_path`, case-insensitively on the severity word.
pub(crate) fn locate_diagnostic(output: &str, source_path: &Path) -> Option<(usize, String)> {
    let prefix = format!("{}:", source_path.display());
    output.lines().find_map(|line| {
        let rest = line.strip_prefix(&prefix)?;
        let (number, message) = rest.split_once(':')?;
        let number = number.trim().parse().ok()?;
        let message = message.trim();
        message
            .to_ascii_lowercase()
            .starts_with("error")
            .then(|| (number, message.to_string()))
    })
}

/// Ordered encoder backends: a backend that is unavailable or rejects an
/// instruction hands over to the next one.
pub struct OracleChain {
    backends: Vec<Box<dyn EncoderBackend>>,
}

impl OracleChain {
    pub fn new(backends: Vec<Box<dyn EncoderBackend>>) -> Self {
        Self { backends }
    }

    pub fn from_config(config: &RewriterConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .map(|kind| -> Box<dyn EncoderBackend> {
                match kind {
                    BackendKind::Yasm => Box::new(YasmBackend::from_config(config)),
                    BackendKind::Gas => Box::new(GasBackend::from_config(config)),
                    BackendKind::Arm64 => Box::new(Arm64GasBackend::from_config(config)),
                }
            })
            .collect();
        Self::new(backends)
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    pub fn encode(&self, input: &OracleInput) -> Result<Vec<u8>, RewriteError> {
        let (backend, bytes) = self.try_backends(|backend| backend.encode(input))?;
        if bytes.is_empty() {
            return Err(RewriteError::Encode {
                backend: backend.to_string(),
                line_number: input.line_number,
                instruction: input.original.clone(),
                diagnostic: "no bytes produced".to_string(),
            });
        }
        Ok(bytes)
    }

    pub fn encode_batch(&self, inputs: &[OracleInput]) -> Result<Vec<Vec<u8>>, RewriteError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let (backend, encodings) = self.try_backends(|backend| backend.encode_batch(inputs))?;
        if encodings.len() != inputs.len() {
            return Err(RewriteError::ListingCorrelation {
                backend: backend.to_string(),
                detail: format!(
                    "submitted {} instructions, received {} encodings",
                    inputs.len(),
                    encodings.len()
                ),
            });
        }
        if let Some(position) = encodings.iter().position(Vec::is_empty) {
            return Err(RewriteError::ListingCorrelation {
                backend: backend.to_string(),
                detail: format!("no bytes for line {}", inputs[position].line_number),
            });
        }
        Ok(encodings)
    }

    fn try_backends<T>(
        &self,
        mut attempt: impl FnMut(&dyn EncoderBackend) -> Result<T, BackendError>,
    ) -> Result<(&'static str, T), RewriteError> {
        let mut tried = Vec::with_capacity(self.backends.len());
        let mut unavailable = None;
        let mut rejection = None;

        for backend in &self.backends {
            tried.push(backend.name().to_string());
            match attempt(backend.as_ref()) {
                Ok(value) => return Ok((backend.name(), value)),
                Err(BackendError::Unavailable { backend, detail }) => {
                    warn!("{backend} is unavailable: {detail}");
                    unavailable = Some(detail);
                }
                Err(err @ BackendError::Rejected { .. }) => {
                    debug!("{err}");
                    rejection = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        match rejection {
            Some(err) => Err(err.into()),
            None => Err(RewriteError::EncoderUnavailable {
                tried,
                detail: unavailable.unwrap_or_else(|| "no encoder backends configured".to_string()),
            }),
        }
    }
}
