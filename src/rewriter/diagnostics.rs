// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::classifier::ClassifiedDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    ClassificationAmbiguous,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::ClassificationAmbiguous => "classification-ambiguous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteDiagnostic {
    pub kind: DiagnosticKind,
    pub line_number: usize,
    pub message: String,
}

pub fn collect_ambiguity_diagnostics(classified: &ClassifiedDocument) -> Vec<RewriteDiagnostic> {
    let mut diagnostics = Vec::new();
    for (idx, line) in classified.lines.iter().enumerate() {
        if let Some(message) = &line.suspicious {
            diagnostics.push(RewriteDiagnostic {
                kind: DiagnosticKind::ClassificationAmbiguous,
                line_number: idx + 1,
                message: format!("{message}; line left unchanged"),
            });
        }
    }
    diagnostics
}
