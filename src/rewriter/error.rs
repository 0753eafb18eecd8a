// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::config::ConfigError;
use crate::oracle::BackendError;

/// Fatal rewrite failures. A run that hits any of these writes nothing.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("no encoder backend available (tried {}): {detail}", .tried.join(", "))]
    EncoderUnavailable { tried: Vec<String>, detail: String },

    #[error("{backend} error (line {line_number} for '{instruction}'): {diagnostic}")]
    Encode {
        backend: String,
        line_number: usize,
        instruction: String,
        diagnostic: String,
    },

    #[error("{backend} output could not be matched to the submitted instructions: {detail}")]
    ListingCorrelation { backend: String, detail: String },

    #[error("{context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RewriteError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Stable identifier used in structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EncoderUnavailable { .. } => "encoder-unavailable",
            Self::Encode { .. } => "encode-error",
            Self::ListingCorrelation { .. } => "listing-correlation",
            Self::Resource { .. } => "resource-error",
            Self::Io { .. } => "io-error",
            Self::Config(_) => "config-error",
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::Encode { line_number, .. } => Some(*line_number),
            _ => None,
        }
    }
}

impl From<BackendError> for RewriteError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable { backend, detail } => Self::EncoderUnavailable {
                tried: vec![backend.to_string()],
                detail,
            },
            BackendError::Rejected {
                backend,
                line_number,
                instruction,
                diagnostic,
            } => Self::Encode {
                backend: backend.to_string(),
                line_number,
                instruction,
                diagnostic,
            },
            BackendError::Correlation { backend, detail } => Self::ListingCorrelation {
                backend: backend.to_string(),
                detail,
            },
            BackendError::Resource { context, source } => Self::Resource { context, source },
        }
    }
}
