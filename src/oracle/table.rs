// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::collections::HashMap;

use super::{BackendError, EncoderBackend, OracleInput};

const BACKEND: &str = "TABLE";

/// Lookup-table encoder for offline use. Keys are compared after
/// normalizing case and whitespace, so `vpaddq  xmm0, xmm1,xmm8` and
/// `VPADDQ XMM0,XMM1,XMM8` are the same entry.
#[derive(Debug, Clone, Default)]
pub struct TableBackend {
    entries: HashMap<String, Vec<u8>>,
}

impl TableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, instruction: &str, bytes: &[u8]) -> Self {
        self.insert(instruction, bytes);
        self
    }

    pub fn insert(&mut self, instruction: &str, bytes: &[u8]) {
        self.entries.insert(table_key(instruction), bytes.to_vec());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn table_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(", ", ",")
        .replace(" ,", ",")
        .to_ascii_uppercase()
}

impl EncoderBackend for TableBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn encode(&self, input: &OracleInput) -> Result<Vec<u8>, BackendError> {
        self.entries
            .get(&table_key(&input.text))
            .cloned()
            .ok_or_else(|| BackendError::rejected(BACKEND, input, "unknown instruction"))
    }
}
