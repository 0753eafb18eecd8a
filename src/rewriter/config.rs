// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::rewriter::literal::{TokenSet, TokenWidth, LITERAL_INDENT};

/// Smallest line budget that still holds one QUAD token.
pub const MIN_LINE_BUDGET: usize = LITERAL_INDENT.len() + TokenWidth::Quad.rendered_len();

/// Oracle bit-width directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitMode {
    Bits16,
    Bits32,
    #[default]
    Bits64,
}

impl BitMode {
    pub fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            16 => Some(Self::Bits16),
            32 => Some(Self::Bits32),
            64 => Some(Self::Bits64),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Bits16 => 16,
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Yasm,
    Gas,
    /// GNU `as` targeting armv8-a.
    Arm64,
}

impl BackendKind {
    pub const NAMES: &'static str = "yasm, gas or arm64";

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "yasm" => Some(Self::Yasm),
            "gas" | "as" => Some(Self::Gas),
            "arm64" | "gas-arm64" => Some(Self::Arm64),
            _ => None,
        }
    }

    pub fn token_set(self) -> TokenSet {
        match self {
            Self::Yasm | Self::Gas => TokenSet::Amd64,
            Self::Arm64 => TokenSet::Arm64,
        }
    }
}

/// Rewriter settings used by the rewriting engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriterConfig {
    pub comment_column: usize,
    pub line_budget: usize,
    pub pack: bool,
    pub batch: bool,
    pub bits: BitMode,
    pub backends: Vec<BackendKind>,
    pub timeout_ms: u64,
    pub gas_path: String,
    pub yasm_path: String,
    pub preserve_line_endings: bool,
    pub preserve_final_newline: bool,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            comment_column: 65,
            line_budget: 80,
            pack: false,
            batch: true,
            bits: BitMode::Bits64,
            backends: vec![BackendKind::Yasm, BackendKind::Gas],
            timeout_ms: 10_000,
            gas_path: "as".to_string(),
            yasm_path: "yasm".to_string(),
            preserve_line_endings: true,
            preserve_final_newline: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl RewriterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Pseudo-ops generated literals use, fixed by the configured backends.
    pub fn token_set(&self) -> TokenSet {
        self.backends
            .first()
            .map_or(TokenSet::Amd64, |kind| kind.token_set())
    }

    /// Checks cross-field constraints after file values and overrides merge.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line_budget < MIN_LINE_BUDGET {
            return Err(ConfigError::new(format!(
                "line_budget must be >= {MIN_LINE_BUDGET} (one {} token)",
                TokenWidth::Quad.keyword()
            )));
        }
        if self.comment_column == 0 {
            return Err(ConfigError::new("comment_column must be >= 1"));
        }
        if self.backends.is_empty() {
            return Err(ConfigError::new("at least one encoder backend is required"));
        }
        let token_set = self.token_set();
        if self.backends.iter().any(|kind| kind.token_set() != token_set) {
            return Err(ConfigError::new(
                "arm64 backend cannot be combined with x86 backends",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::new("timeout_ms must be >= 1"));
        }
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|err| {
            ConfigError::new(format!("failed to read '{}': {err}", path.display()))
        })?;
        let config = Self::parse_toml(path, &text)?;
        config
            .validate()
            .map_err(|err| ConfigError::new(format!("{}: {err}", path.display())))?;
        Ok(config)
    }

    fn parse_toml(path: &Path, source: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut section = ConfigSection::Root;
        let mut seen_keys = HashSet::new();

        for (index, raw_line) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_toml_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') {
                if !line.ends_with(']') {
                    return Err(config_error(path, line_no, "invalid section header"));
                }
                let name = line[1..line.len() - 1].trim();
                section = if name.eq_ignore_ascii_case("rewriter") {
                    ConfigSection::Rewriter
                } else {
                    ConfigSection::Other
                };
                continue;
            }

            if section == ConfigSection::Other {
                continue;
            }

            let Some((raw_key, raw_value)) = line.split_once('=') else {
                return Err(config_error(path, line_no, "expected key = value"));
            };
            let key = raw_key.trim();
            let value = raw_value.trim();
            if key.is_empty() || value.is_empty() {
                return Err(config_error(path, line_no, "expected key = value"));
            }

            let canonical_key = normalize_key(key);
            let dedup_key = normalize_dedup_key(&canonical_key);
            if !seen_keys.insert(dedup_key) {
                return Err(config_error(
                    path,
                    line_no,
                    format!("duplicate key '{}'", key),
                ));
            }

            match canonical_key.as_str() {
                "comment_column" | "placeholder_width" => {
                    config.comment_column = parse_usize(path, line_no, key, value, true)?
                }
                "line_budget" => config.line_budget = parse_usize(path, line_no, key, value, true)?,
                "pack" => config.pack = parse_bool(path, line_no, key, value)?,
                "batch" => config.batch = parse_bool(path, line_no, key, value)?,
                "bits" => {
                    let bits = parse_usize(path, line_no, key, value, true)?;
                    config.bits = BitMode::from_bits(bits as u64).ok_or_else(|| {
                        config_error(
                            path,
                            line_no,
                            format!("invalid bit width for '{}': {}", key, value),
                        )
                    })?;
                }
                "backends" => config.backends = parse_backends(path, line_no, key, value)?,
                "timeout_ms" => {
                    config.timeout_ms = parse_usize(path, line_no, key, value, true)? as u64
                }
                "gas_path" | "as_path" => config.gas_path = parse_string(path, line_no, key, value)?,
                "yasm_path" => config.yasm_path = parse_string(path, line_no, key, value)?,
                "preserve_line_endings" => {
                    config.preserve_line_endings = parse_bool(path, line_no, key, value)?
                }
                "preserve_final_newline" => {
                    config.preserve_final_newline = parse_bool(path, line_no, key, value)?
                }
                _ => {
                    return Err(config_error(
                        path,
                        line_no,
                        format!("unknown key '{}'", key),
                    ));
                }
            }
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSection {
    Root,
    Rewriter,
    Other,
}

fn config_error(path: &Path, line_no: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::new(format!(
        "{}:{}: {}",
        path.display(),
        line_no,
        message.into()
    ))
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

fn normalize_dedup_key(key: &str) -> String {
    match key {
        "placeholder_width" => "comment_column".to_string(),
        "as_path" => "gas_path".to_string(),
        other => other.to_string(),
    }
}

fn parse_bool(path: &Path, line_no: usize, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(config_error(
            path,
            line_no,
            format!("invalid boolean for '{}': {}", key, value),
        )),
    }
}

fn parse_usize(
    path: &Path,
    line_no: usize,
    key: &str,
    value: &str,
    minimum_one: bool,
) -> Result<usize, ConfigError> {
    let normalized = value.trim().replace('_', "");
    let parsed = normalized.parse::<usize>().map_err(|_| {
        config_error(
            path,
            line_no,
            format!("invalid integer for '{}': {}", key, value),
        )
    })?;
    if minimum_one && parsed == 0 {
        return Err(config_error(
            path,
            line_no,
            format!("'{}' must be >= 1", key),
        ));
    }
    Ok(parsed)
}

fn parse_string(path: &Path, line_no: usize, key: &str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        return Ok(value[1..value.len() - 1].to_string());
    }
    if value.is_empty() || value.contains(' ') || value.contains('\t') {
        return Err(config_error(
            path,
            line_no,
            format!("invalid string for '{}': {}", key, value),
        ));
    }
    Ok(value.to_string())
}

fn parse_backends(
    path: &Path,
    line_no: usize,
    key: &str,
    value: &str,
) -> Result<Vec<BackendKind>, ConfigError> {
    let value = value.trim();
    let Some(inner) = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return Err(config_error(
            path,
            line_no,
            format!("expected a list for '{}': {}", key, value),
        ));
    };

    let mut backends = Vec::new();
    for item in inner.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let name = parse_string(path, line_no, key, item)?;
        let kind = BackendKind::parse(&name).ok_or_else(|| {
            config_error(path, line_no, format!("unknown backend '{}'", name))
        })?;
        if !backends.contains(&kind) {
            backends.push(kind);
        }
    }
    if backends.is_empty() {
        return Err(config_error(
            path,
            line_no,
            format!("'{}' must name at least one backend", key),
        ));
    }
    Ok(backends)
}

fn strip_toml_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for (idx, ch) in line.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single && !escaped => in_double = !in_double,
            '#' if !in_single && !in_double => return &line[..idx],
            _ => {}
        }

        escaped = in_double && ch == '\\' && !escaped;
        if ch != '\\' {
            escaped = false;
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, BitMode, ConfigError, RewriterConfig, TokenSet};
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn default_config_matches_documented_contract() {
        let cfg = RewriterConfig::default();
        assert_eq!(cfg.comment_column, 65);
        assert_eq!(cfg.line_budget, 80);
        assert!(!cfg.pack);
        assert!(cfg.batch);
        assert_eq!(cfg.bits, BitMode::Bits64);
        assert_eq!(cfg.backends, vec![BackendKind::Yasm, BackendKind::Gas]);
        assert_eq!(cfg.timeout_ms, 10_000);
        assert!(cfg.preserve_line_endings);
        assert!(cfg.preserve_final_newline);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_from_path_parses_root_keys() {
        let (_dir, path) = create_temp_config(
            "comment_column = 48
line_budget = 100
pack = true
batch = false
bits = 32
timeout_ms = 2_500
",
        );
        let cfg = RewriterConfig::load_from_path(&path).expect("load config");
        assert_eq!(cfg.comment_column, 48);
        assert_eq!(cfg.line_budget, 100);
        assert!(cfg.pack);
        assert!(!cfg.batch);
        assert_eq!(cfg.bits, BitMode::Bits32);
        assert_eq!(cfg.timeout_ms, 2500);
    }

    #[test]
    fn load_from_path_parses_rewriter_section_with_alias_keys() {
        let (_dir, path) = create_temp_config(
            "[other]
ignored = whatever
[rewriter]
placeholder-width = 70  # trailing comment
backends = [\"gas\", 'yasm']
as_path = \"/opt/binutils/bin/as\"
yasm_path = yasm
",
        );
        let cfg = RewriterConfig::load_from_path(&path).expect("load config");
        assert_eq!(cfg.comment_column, 70);
        assert_eq!(cfg.backends, vec![BackendKind::Gas, BackendKind::Yasm]);
        assert_eq!(cfg.gas_path, "/opt/binutils/bin/as");
        assert_eq!(cfg.yasm_path, "yasm");
    }

    #[test]
    fn load_from_path_rejects_unknown_key() {
        let (_dir, path) = create_temp_config("oops = 1\n");
        let err = RewriterConfig::load_from_path(&path).expect_err("unknown key must fail");
        assert_error_contains(&err, ":1: unknown key 'oops'");
    }

    #[test]
    fn load_from_path_rejects_duplicate_alias_keys() {
        let (_dir, path) = create_temp_config(
            "comment_column = 60
[rewriter]
placeholder_width = 61
",
        );
        let err = RewriterConfig::load_from_path(&path).expect_err("duplicate should fail");
        assert_error_contains(&err, ":3: duplicate key 'placeholder_width'");
    }

    #[test]
    fn load_from_path_rejects_bad_values() {
        for (content, needle) in [
            ("bits = 48\n", "invalid bit width"),
            ("pack = yes\n", "invalid boolean"),
            ("backends = [\"nasm\"]\n", "unknown backend 'nasm'"),
            ("backends = gas\n", "expected a list"),
            ("backends = []\n", "must name at least one backend"),
            ("timeout_ms = 0\n", "'timeout_ms' must be >= 1"),
            ("line_budget = 20\n", "line_budget must be >="),
            ("backends = [\"arm64\", \"gas\"]\n", "cannot be combined"),
        ] {
            let (_dir, path) = create_temp_config(content);
            let err = RewriterConfig::load_from_path(&path).expect_err(content);
            assert_error_contains(&err, needle);
        }
    }

    #[test]
    fn arm64_backend_selects_word_tokens() {
        let (_dir, path) = create_temp_config("backends = [\"gas-arm64\"]\n");
        let cfg = RewriterConfig::load_from_path(&path).expect("load config");
        assert_eq!(cfg.backends, vec![BackendKind::Arm64]);
        assert_eq!(cfg.token_set(), TokenSet::Arm64);
        assert_eq!(RewriterConfig::default().token_set(), TokenSet::Amd64);
    }

    fn assert_error_contains(err: &ConfigError, needle: &str) {
        assert!(
            err.to_string().contains(needle),
            "error '{}' did not contain '{}'",
            err,
            needle
        );
    }

    fn create_temp_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".plan9enc.toml");
        fs::write(&path, content).expect("write config");
        (dir, path)
    }
}
